//! Client for streamed AI travel-plan generation.
//!
//! The server answers `POST /api/projects/{projectId}/plans/generate` with a
//! newline-delimited text stream of `progress:<n>` and `message:<text>`
//! records followed by a JSON plan. This crate opens that stream, folds it
//! into a [`StreamState`], and reports progress as it arrives.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use planner_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), GenerateError> {
//! let planner = PlanGenerator::new(Arc::new(HttpPlanTransport::from_env()?));
//! let mut run = planner
//!     .start("project-42", GeneratePlanRequest::new("Autumn in Kyoto"))
//!     .await?;
//!
//! while let Some(event) = run.next_event().await {
//!     match event {
//!         GenerationEvent::Progress { percent, message, .. } => {
//!             println!("{percent:>3}% {}", message.unwrap_or_default())
//!         }
//!         GenerationEvent::Finished { status, .. } => println!("{status}"),
//!         GenerationEvent::Started { .. } => {}
//!     }
//! }
//! let report = run.finish().await?;
//! println!("{:?}", report.plan());
//! # Ok(())
//! # }
//! ```
//!
//! The lower-level [`consume`] can be driven directly with any byte stream
//! and any [`ProgressSink`].

/// Client configuration.
pub mod config;
/// Streaming consumer.
pub mod consumer;
/// Public error types.
pub mod errors;
/// Logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Line framing and record classification.
pub mod record;
/// Generation request body.
pub mod request;
/// Generator, run handle and cancellation handle.
pub mod run;
/// Progress sink contract.
pub mod sink;
/// Stream state and final status.
pub mod state;
/// Run events.
pub mod stream;
/// HTTP transport.
pub mod transport;

pub use config::PlannerClientConfig;
pub use consumer::{CancelToken, ConsumeOutcome, ConsumerOptions, consume, consume_with_options};
pub use errors::{CONFLICT_MESSAGE, ConsumeError, GenerateError};
pub use observability::{LogOutput, ObservabilityConfig, init_observability, init_with};
pub use record::{LineDecoder, RawRecord, classify};
pub use request::GeneratePlanRequest;
pub use run::{AbortHandle, GenerationReport, GenerationRun, PlanGenerator, PlanGeneratorBuilder};
pub use sink::{NoopSink, ProgressSink};
pub use state::{GenerationStatus, StreamState};
pub use stream::GenerationEvent;
pub use transport::{ByteStream, HttpPlanTransport, PlanResponse, PlanTransport};
