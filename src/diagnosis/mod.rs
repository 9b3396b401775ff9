pub mod client;
pub mod fallback;
pub mod orchestrator;
pub mod progress;
pub mod state;
pub mod stream;

pub use client::{DiagnosisApi, DiagnosisReply, DiagnosisRequest, HttpDiagnosisClient};
pub use fallback::fallback_message;
pub use orchestrator::DiagnosisOrchestrator;
pub use state::{DiagnosisSession, DiagnosisState};
