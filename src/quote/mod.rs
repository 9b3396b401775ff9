pub mod client;
pub mod types;

pub use client::{HttpQuoteClient, QuoteApi, QuoteResult};
pub use types::{is_snapshot_valid, Figure, PriceBar, QuoteSnapshot, StockInfo};
