//! Common imports for typical usage.
pub use crate::{
    AbortHandle, CancelToken, ConsumeOutcome, GeneratePlanRequest, GenerateError, GenerationEvent,
    GenerationReport, GenerationRun, GenerationStatus, HttpPlanTransport, PlanGenerator,
    PlannerClientConfig, ProgressSink, StreamState,
};
