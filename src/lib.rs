//! Stock diagnosis - headless page controller for a stock lookup and AI
//! diagnosis front-end
//!
//! This library provides the search box over the static stock list, the
//! quote fetch, the streaming diagnosis orchestrator and the chaining that
//! turns a fresh selection into exactly one diagnosis run.

pub mod api;
pub mod bus;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod constants;
pub mod conversion;
pub mod diagnosis;
pub mod error;
pub mod events;
pub mod quote;
pub mod search;
pub mod session;
pub mod tracking;

// Re-export commonly used types
pub use bus::EventBus;
pub use chain::{AfterFetch, ChainCoordinator};
pub use config::AppConfig;
pub use diagnosis::{DiagnosisOrchestrator, DiagnosisState};
pub use events::{DiagnosisEvent, Event, PageParams, QuoteEvent};

#[cfg(test)]
mod testing;
