use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument as _, debug, info, info_span, warn};

use crate::consumer::{ConsumeOutcome, ConsumerOptions, consume_with_options};
use crate::errors::GenerateError;
use crate::request::{GeneratePlanRequest, validate_project_id};
use crate::sink::ChannelSink;
use crate::state::{GenerationStatus, StreamState};
use crate::stream::GenerationEvent;
use crate::transport::PlanTransport;

/// Handle used to request cancellation of a running generation.
#[derive(Clone)]
pub struct AbortHandle {
    token: CancellationToken,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Observed at the next read; the run then finishes with
    /// [`ConsumeOutcome::Cancelled`].
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Final result of a generation that did not fail.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationReport {
    pub run_id: uuid::Uuid,
    pub outcome: ConsumeOutcome,
    pub state: StreamState,
}

impl GenerationReport {
    /// The terminal plan payload, if one was received and the run completed.
    pub fn plan(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            ConsumeOutcome::Completed(payload) => payload.as_ref(),
            ConsumeOutcome::Cancelled => None,
        }
    }
}

struct ActiveRun {
    run_id: uuid::Uuid,
    token: CancellationToken,
    task: JoinHandle<()>,
}

struct GeneratorInner {
    transport: Arc<dyn PlanTransport>,
    consumer_options: ConsumerOptions,
    timeout: Option<Duration>,
    active: Mutex<Option<ActiveRun>>,
}

impl GeneratorInner {
    fn take_active(&self) -> Option<ActiveRun> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn clear_active(&self, run_id: uuid::Uuid) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|run| run.run_id == run_id) {
            *active = None;
        }
    }
}

/// Starts plan generations, keeping at most one in flight.
///
/// Starting a new generation cancels the previous one and waits for it to
/// stop before the new request is sent.
#[derive(Clone)]
pub struct PlanGenerator {
    inner: Arc<GeneratorInner>,
}

impl PlanGenerator {
    pub fn new(transport: Arc<dyn PlanTransport>) -> Self {
        Self::builder(transport).build()
    }

    pub fn builder(transport: Arc<dyn PlanTransport>) -> PlanGeneratorBuilder {
        PlanGeneratorBuilder {
            transport,
            consumer_options: ConsumerOptions::default(),
            timeout: None,
        }
    }

    /// Cancels the in-flight generation, if any, and waits for it to stop.
    pub async fn cancel_active(&self) {
        if let Some(previous) = self.inner.take_active() {
            info!(run_id = %previous.run_id, "cancelling in-flight generation");
            previous.token.cancel();
            let _ = previous.task.await;
        }
    }

    /// Returns `true` while a generation started by this generator is running.
    pub fn has_active(&self) -> bool {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|run| !run.task.is_finished())
    }

    /// Validates input, cancels any previous run and starts a new one.
    pub async fn start(
        &self,
        project_id: impl Into<String>,
        request: GeneratePlanRequest,
    ) -> Result<GenerationRun, GenerateError> {
        let project_id = project_id.into();
        validate_project_id(&project_id)?;
        request.validate()?;

        self.cancel_active().await;

        let run_id = uuid::Uuid::new_v4();
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let (final_tx, final_rx) = oneshot::channel();

        let span = info_span!("generation", %run_id, %project_id);
        let task = tokio::spawn(
            run_task(
                self.inner.clone(),
                RunContext {
                    run_id,
                    project_id: project_id.clone(),
                    request,
                    token: token.clone(),
                },
                tx,
                final_tx,
            )
            .instrument(span),
        );

        let displaced = self
            .inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ActiveRun {
                run_id,
                token: token.clone(),
                task,
            });
        if let Some(displaced) = displaced {
            warn!(run_id = %displaced.run_id, "concurrent start displaced a running generation");
            displaced.token.cancel();
        }

        Ok(GenerationRun {
            run_id,
            project_id,
            rx,
            final_rx: Some(final_rx),
            abort_handle: AbortHandle { token },
        })
    }

    /// Starts a generation and waits for its final result.
    pub async fn generate(
        &self,
        project_id: impl Into<String>,
        request: GeneratePlanRequest,
    ) -> Result<GenerationReport, GenerateError> {
        self.start(project_id, request).await?.finish().await
    }
}

/// Builder for [`PlanGenerator`].
pub struct PlanGeneratorBuilder {
    transport: Arc<dyn PlanTransport>,
    consumer_options: ConsumerOptions,
    timeout: Option<Duration>,
}

impl PlanGeneratorBuilder {
    pub fn consumer_options(mut self, options: ConsumerOptions) -> Self {
        self.consumer_options = options;
        self
    }

    /// Cancels a run that has not finished after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> PlanGenerator {
        PlanGenerator {
            inner: Arc::new(GeneratorInner {
                transport: self.transport,
                consumer_options: self.consumer_options,
                timeout: self.timeout,
                active: Mutex::new(None),
            }),
        }
    }
}

/// Handle returned by [`PlanGenerator::start`].
///
/// Dropping it cancels the run.
pub struct GenerationRun {
    run_id: uuid::Uuid,
    project_id: String,
    rx: mpsc::UnboundedReceiver<GenerationEvent>,
    final_rx: Option<oneshot::Receiver<Result<GenerationReport, GenerateError>>>,
    abort_handle: AbortHandle,
}

impl GenerationRun {
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next event. Returns `None` once the run task is gone.
    pub async fn next_event(&mut self) -> Option<GenerationEvent> {
        self.rx.recv().await
    }

    /// Waits for the run to end and returns its result.
    ///
    /// Safe to call after consuming events with `next_event()`.
    pub async fn finish(mut self) -> Result<GenerationReport, GenerateError> {
        let Some(final_rx) = self.final_rx.take() else {
            return Err(GenerateError::protocol_msg("generation result already taken"));
        };
        match final_rx.await {
            Ok(result) => result,
            Err(_) => Err(GenerateError::protocol_msg(format!(
                "generation task ended without final result (run_id={}, project={})",
                self.run_id, self.project_id
            ))),
        }
    }
}

impl Drop for GenerationRun {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

struct RunContext {
    run_id: uuid::Uuid,
    project_id: String,
    request: GeneratePlanRequest,
    token: CancellationToken,
}

async fn run_task(
    inner: Arc<GeneratorInner>,
    ctx: RunContext,
    tx: mpsc::UnboundedSender<GenerationEvent>,
    final_tx: oneshot::Sender<Result<GenerationReport, GenerateError>>,
) {
    let RunContext {
        run_id,
        project_id,
        request,
        token,
    } = ctx;

    let _ = tx.send(GenerationEvent::Started {
        run_id,
        project_id: project_id.clone(),
    });

    let timer = inner.timeout.map(|timeout| {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if !token.is_cancelled() {
                warn!(%run_id, ?timeout, "generation timed out, cancelling");
                token.cancel();
            }
        })
    });

    let mut state = StreamState::new();
    let mut sink = ChannelSink {
        run_id,
        tx: tx.clone(),
    };
    let result = drive(&inner, &project_id, &request, &mut state, &mut sink, &token).await;

    if let Some(timer) = timer {
        timer.abort();
    }

    let status = GenerationStatus::from_result(&result);
    match &result {
        Ok(outcome) => info!(%run_id, %project_id, cancelled = outcome.is_cancelled(), log_lines = state.log_lines.len(), "generation finished"),
        Err(err) => warn!(%run_id, %project_id, error = %err, "generation failed"),
    }
    let _ = tx.send(GenerationEvent::Finished { run_id, status });

    inner.clear_active(run_id);
    let _ = final_tx.send(result.map(|outcome| GenerationReport {
        run_id,
        outcome,
        state,
    }));
}

async fn drive(
    inner: &GeneratorInner,
    project_id: &str,
    request: &GeneratePlanRequest,
    state: &mut StreamState,
    sink: &mut ChannelSink,
    token: &CancellationToken,
) -> Result<ConsumeOutcome, GenerateError> {
    let response = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(%project_id, "generation cancelled before the stream opened");
            state.mark_cancelled();
            return Ok(ConsumeOutcome::Cancelled);
        }
        opened = inner.transport.open(project_id, request) => opened?,
    };
    debug!(%project_id, status = response.status, "generation stream opened");
    let outcome =
        consume_with_options(response.body, state, sink, token, &inner.consumer_options).await?;
    Ok(outcome)
}
