// Resolution and acquisition pipeline: rate check, resolve, acquire, decode, persist

pub mod acquirer;
pub mod aggregator;
pub mod decoder;
pub mod orchestrator;
pub mod rate_limiter;
pub mod resolver;

pub use orchestrator::{InvocationOutcome, InvocationReport, PipelineOrchestrator};
