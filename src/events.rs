use serde::Serialize;

use crate::diagnosis::state::DiagnosisState;

/// Lifecycle notifications of the diagnosis orchestrator
#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosisEvent {
    Started {
        code: String,
    },
    StateChanged {
        code: String,
        state: DiagnosisState,
    },
    Progress {
        code: String,
        progress: f64,
    },
    /// One appended stream fragment, in arrival order
    Content {
        code: String,
        chunk: String,
    },
    OverlayHidden {
        code: String,
    },
    Completed {
        code: String,
        name: String,
        duration_ms: u64,
    },
    Dismissed,
}

/// URL parameters the page was opened with
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub gclid: Option<String>,
    #[serde(default, rename = "racText")]
    pub rac_text: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum QuoteEvent {
    Loaded {
        code: String,
        name: String,
        params: PageParams,
    },
    Failed {
        code: String,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConversionEvent {
    pub gclid: Option<String>,
    pub redirect_url: String,
}

// Global Event Enum
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Diagnosis(DiagnosisEvent),
    Quote(QuoteEvent),
    Conversion(ConversionEvent),
}
