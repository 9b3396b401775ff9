//! Application-wide constants and magic numbers
//!
//! This module centralizes the fixed timings, sizes and endpoint paths the
//! page controller depends on. Runtime overrides live in `config`.

use std::time::Duration;

/// Diagnosis progress simulation and hand-off timings
pub mod diagnosis {
    use super::*;

    /// Interval between two progress animator ticks
    pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

    /// Fixed increment per tick when no quote data backs the diagnosis
    pub const SIMULATED_STEP: f64 = 5.0;

    /// How long the quote-less diagnosis pretends to work before settling
    pub const SIMULATED_DURATION: Duration = Duration::from_millis(2000);

    /// Pause between progress hitting 100 and the overlay being hidden
    pub const SETTLE_DELAY: Duration = Duration::from_millis(600);

    /// Hard client-side deadline for the diagnosis response to arrive
    pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(50_000);

    /// Below this value the animator advances fast
    pub const FAST_TIER_CEILING: f64 = 85.0;

    /// Below this value (and above the fast tier) the animator crawls
    pub const SLOW_TIER_CEILING: f64 = 95.0;

    /// Upper bound of a random fast-tier step
    pub const FAST_TIER_MAX_STEP: f64 = 15.0;

    /// Upper bound of a random slow-tier step
    pub const SLOW_TIER_MAX_STEP: f64 = 2.0;

    /// Progress value that marks a finished animation
    pub const PROGRESS_COMPLETE: f64 = 100.0;
}

/// Search panel constants
pub mod search {
    /// Matches shown per result page
    pub const PAGE_SIZE: usize = 5;
}

/// Stream record framing of the diagnosis endpoint
pub mod stream {
    /// Prefix of every record that carries a JSON payload
    pub const DATA_PREFIX: &str = "data: ";

    /// Content type announcing an incremental reply
    pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
}

/// Remote endpoint paths, relative to their configured base URL
pub mod endpoints {
    pub const QUOTE_DATA: &str = "/api/stock/data";
    pub const DIAGNOSIS: &str = "/api/gemini/diagnosis";
    pub const REDIRECT_SELECT: &str = "/api/line-redirects/select";
    pub const CATALOG: &str = "/stock.json";
}

/// Tracking event names
pub mod events {
    pub const PAGE_LOAD: &str = "page_load";
    pub const DIAGNOSIS_START: &str = "diagnosis_start";
    pub const DIAGNOSIS_CLICK: &str = "diagnosis_click";
    pub const CONVERSION: &str = "conversion";
}

/// Defaults for the runtime wiring
pub mod runtime {
    pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
    pub const DEFAULT_API_BASE: &str = "http://localhost:8080";
    pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
    pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 256;
    pub const TRACKING_TIMEOUT_SECS: u64 = 10;
}
