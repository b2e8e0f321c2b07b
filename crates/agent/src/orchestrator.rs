//! The bounded multi-turn loop.
//!
//! One [`Orchestrator::run`] call serves one user message: it streams a
//! model response through the classifier, dispatches any tool invocations,
//! feeds the outcomes back, and repeats until an answer arrives or the
//! iteration budget runs out. Budget exhaustion is a degraded completion,
//! never an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use lorecall_config::OrchestratorConfig;
use lorecall_core::{
    AgentError, AgentPhase, BlockKind, ContentBlock, ConversationTurn, EngineEvent, EventBus,
    ModelTransport, Session, SessionId, StreamDelta, ToolDispatcher, ToolInvocation, ToolOutcome,
    TransportError, TransportRequest, Usage,
};
use lorecall_protocol::{extract_invocation, BlockClassifier, NewlineSquasher};
use lorecall_telemetry::{IterationRecord, RunReport};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::prompt;

/// Fallback answer when the budget runs out with no visible prose to show.
const BUDGET_NOTICE: &str = "I ran out of lookup iterations before reaching a final answer.";

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The `<present_answer>` body, or the visible prose on answerless and
    /// degraded runs.
    pub answer: String,

    /// True when the iteration budget ran out before an answer.
    pub degraded: bool,

    /// Per-iteration latency, usage, and tool outcomes.
    pub report: RunReport,
}

/// Drives the loop for one user message at a time.
pub struct Orchestrator {
    transport: Arc<dyn ModelTransport>,
    dispatcher: Arc<dyn ToolDispatcher>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    config: OrchestratorConfig,
    events: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn ModelTransport>,
        dispatcher: Arc<dyn ToolDispatcher>,
        model: impl Into<String>,
        config: OrchestratorConfig,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            config,
            events,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the per-response token cap.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Serve one user message.
    ///
    /// Classifier deltas stream to `deltas` as they are produced; sending to
    /// a dropped receiver is ignored. The token is polled between iterations
    /// and tool dispatches and raced against in-flight round trips, so a
    /// cancel lands promptly even mid-stream. On any error the session keeps
    /// every turn pushed so far.
    pub async fn run(
        &self,
        session: &mut Session,
        user_message: &str,
        deltas: mpsc::Sender<StreamDelta>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, AgentError> {
        let mut phase = AgentPhase::Pending;
        self.advance(&session.id, &mut phase, AgentPhase::Processing)?;

        info!(
            session_id = %session.id,
            turns = session.turns.len(),
            model = %self.model,
            "Run starting"
        );

        session.push_turn(ConversationTurn::user(user_message));

        let mut report = RunReport::new(session.id.clone());
        let mut run_tools: Vec<String> = Vec::new();
        let mut last_visible = String::new();
        let budget = self.config.max_iterations.max(1) as usize;

        for iteration in 1..=budget {
            if cancel.is_cancelled() {
                return Err(self.fail(&session.id, &mut phase, AgentError::Cancelled));
            }

            self.advance(&session.id, &mut phase, AgentPhase::LlmRoundTrip)?;
            debug!(session_id = %session.id, iteration, "Model round trip");

            let request = TransportRequest {
                model: self.model.clone(),
                messages: prompt::render_messages(session),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };

            let mut record = IterationRecord::new(iteration);
            let llm_start = Instant::now();
            let (blocks, usage) = match self.round_trip(&request, &deltas, cancel).await {
                Ok(done) => done,
                Err(error) => {
                    return Err(self.fail(&session.id, &mut phase, error));
                }
            };
            record.llm_latency_ms = llm_start.elapsed().as_millis() as u64;
            if let Some(usage) = &usage {
                record.record_usage(usage.prompt_tokens, usage.completion_tokens);
            }

            let visible = visible_text(&blocks);
            if !visible.is_empty() {
                last_visible = visible;
            }

            // A completed answer block ends the run.
            if let Some(answer_block) = blocks
                .iter()
                .find(|b| b.kind == BlockKind::Answer && b.complete)
            {
                let answer = answer_block.text.trim().to_string();
                self.advance(&session.id, &mut phase, AgentPhase::Completed)?;
                report.add_iteration(record);
                report.end(false);
                session.push_turn(ConversationTurn::assistant(answer.clone(), run_tools));
                self.publish_iteration(&session.id, iteration);
                self.events
                    .publish(EngineEvent::run_completed(&session.id, false));
                info!(session_id = %session.id, iterations = iteration, "Run completed");
                return Ok(RunOutcome {
                    answer,
                    degraded: false,
                    report,
                });
            }

            let mut invocations: Vec<ToolInvocation> = Vec::new();
            for block in blocks
                .iter()
                .filter(|b| b.kind == BlockKind::ToolCall && b.complete)
            {
                match extract_invocation(block) {
                    Ok(invocation) => invocations.push(invocation),
                    Err(error) => {
                        warn!(error = %error, "Dropping unextractable tool block");
                    }
                }
            }

            // No answer tag and nothing to dispatch: the visible prose is
            // the answer.
            if invocations.is_empty() {
                let answer = last_visible.clone();
                self.advance(&session.id, &mut phase, AgentPhase::Completed)?;
                report.add_iteration(record);
                report.end(false);
                session.push_turn(ConversationTurn::assistant(answer.clone(), run_tools));
                self.publish_iteration(&session.id, iteration);
                self.events
                    .publish(EngineEvent::run_completed(&session.id, false));
                info!(
                    session_id = %session.id,
                    iterations = iteration,
                    "Run completed without an answer tag"
                );
                return Ok(RunOutcome {
                    answer,
                    degraded: false,
                    report,
                });
            }

            self.advance(&session.id, &mut phase, AgentPhase::ToolsExecuting)?;
            let outcomes = if self.config.tool_concurrency <= 1 {
                let mut outcomes = Vec::with_capacity(invocations.len());
                for invocation in &invocations {
                    if cancel.is_cancelled() {
                        return Err(self.fail(&session.id, &mut phase, AgentError::Cancelled));
                    }
                    outcomes.push(self.dispatch_one(invocation).await);
                }
                outcomes
            } else {
                tokio::select! {
                    outcomes = self.dispatch_pool(&invocations) => outcomes,
                    _ = cancel.cancelled() => {
                        return Err(self.fail(&session.id, &mut phase, AgentError::Cancelled));
                    }
                }
            };

            for outcome in &outcomes {
                if !run_tools.contains(&outcome.tool_name) {
                    run_tools.push(outcome.tool_name.clone());
                }
            }

            let rendered = prompt::render_outcomes(&outcomes);
            let turn_tools = outcomes.iter().map(|o| o.tool_name.clone()).collect();
            session.push_turn(ConversationTurn::tool_results(rendered, turn_tools));

            for outcome in outcomes {
                record.record_tool(outcome);
            }
            report.add_iteration(record);
            self.publish_iteration(&session.id, iteration);
        }

        // Budget exhausted: degraded completion.
        warn!(
            session_id = %session.id,
            iterations = budget,
            "Iteration budget exhausted before an answer"
        );
        self.advance(&session.id, &mut phase, AgentPhase::Completed)?;
        report.end(true);

        let answer = if last_visible.is_empty() {
            BUDGET_NOTICE.to_string()
        } else {
            last_visible
        };
        session.push_turn(ConversationTurn::assistant(answer.clone(), run_tools));
        self.events
            .publish(EngineEvent::run_completed(&session.id, true));
        Ok(RunOutcome {
            answer,
            degraded: true,
            report,
        })
    }

    /// One model round trip with retry. Returns the classified blocks and
    /// the reported usage. Every attempt (connect through final fragment)
    /// and every backoff sleep races the cancellation token.
    async fn round_trip(
        &self,
        request: &TransportRequest,
        deltas: &mpsc::Sender<StreamDelta>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<ContentBlock>, Option<Usage>), AgentError> {
        let mut attempt: u32 = 0;
        loop {
            let result = tokio::select! {
                result = self.try_stream(request, deltas) => result,
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            };
            match result {
                Ok(done) => return Ok(done),
                Err(error) if error.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.backoff_delay(attempt, &error);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Model round trip failed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                    }
                    attempt += 1;
                }
                Err(error) => return Err(AgentError::Transport(error)),
            }
        }
    }

    /// One attempt: open the stream and classify it to completion, all
    /// inside the request timeout window.
    async fn try_stream(
        &self,
        request: &TransportRequest,
        deltas: &mpsc::Sender<StreamDelta>,
    ) -> Result<(Vec<ContentBlock>, Option<Usage>), TransportError> {
        let window = Duration::from_secs(self.config.request_timeout_secs);

        let round = async {
            let mut rx = self.transport.stream(request.clone()).await?;
            let mut squasher = NewlineSquasher::new();
            let mut classifier = BlockClassifier::new();
            let mut usage = None;

            while let Some(item) = rx.recv().await {
                let fragment = item?;
                if let Some(text) = &fragment.content {
                    let squashed = squasher.feed(text);
                    if !squashed.is_empty() {
                        self.forward(classifier.push(&squashed), deltas).await;
                    }
                }
                if let Some(reported) = fragment.usage {
                    usage = Some(reported);
                }
                if fragment.done {
                    break;
                }
            }

            let tail = squasher.finish();
            if !tail.is_empty() {
                self.forward(classifier.push(&tail), deltas).await;
            }
            self.forward(classifier.finish(), deltas).await;

            Ok::<_, TransportError>((classifier.blocks().to_vec(), usage))
        };

        tokio::time::timeout(window, round)
            .await
            .map_err(|_| TransportError::Timeout(self.config.request_timeout_secs))?
    }

    /// Forward deltas to the caller's channel, mirroring block boundaries
    /// onto the event bus.
    async fn forward(&self, out: Vec<StreamDelta>, deltas: &mpsc::Sender<StreamDelta>) {
        for delta in out {
            match &delta {
                StreamDelta::BlockStarted { kind, tool_name } => {
                    self.events.publish(EngineEvent::BlockOpened {
                        kind: *kind,
                        tool_name: tool_name.clone(),
                        timestamp: Utc::now(),
                    });
                }
                StreamDelta::BlockFinished { block } => {
                    self.events.publish(EngineEvent::BlockClosed {
                        kind: block.kind,
                        complete: block.complete,
                        timestamp: Utc::now(),
                    });
                }
                StreamDelta::VisibleText { .. } => {}
            }
            let _ = deltas.send(delta).await;
        }
    }

    async fn dispatch_one(&self, invocation: &ToolInvocation) -> ToolOutcome {
        let outcome = self.dispatcher.dispatch(invocation).await;
        debug!(
            tool = %outcome.tool_name,
            success = outcome.success,
            latency_ms = outcome.latency_ms,
            "Tool dispatched"
        );
        self.events.publish(EngineEvent::ToolDispatched {
            tool_name: outcome.tool_name.clone(),
            success: outcome.success,
            duration_ms: outcome.latency_ms,
            timestamp: Utc::now(),
        });
        outcome
    }

    /// Dispatch through a bounded pool. `buffered` keeps outcomes in
    /// extraction order regardless of completion order.
    async fn dispatch_pool(&self, invocations: &[ToolInvocation]) -> Vec<ToolOutcome> {
        let limit = self.config.tool_concurrency.max(1) as usize;
        stream::iter(invocations)
            .map(|invocation| self.dispatch_one(invocation))
            .buffered(limit)
            .collect()
            .await
    }

    fn backoff_delay(&self, attempt: u32, error: &TransportError) -> Duration {
        if let TransportError::RateLimited { retry_after_secs } = error {
            return Duration::from_secs(*retry_after_secs);
        }
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.config.retry_base_delay_ms.saturating_mul(factor))
    }

    fn advance(
        &self,
        session_id: &SessionId,
        phase: &mut AgentPhase,
        next: AgentPhase,
    ) -> Result<(), AgentError> {
        if phase.can_transition_to(next) {
            *phase = next;
            return Ok(());
        }
        let error = AgentError::PhaseViolation {
            from: phase.to_string(),
            to: next.to_string(),
        };
        *phase = AgentPhase::Error;
        self.events
            .publish(EngineEvent::run_failed(session_id, error.to_string()));
        Err(error)
    }

    fn fail(
        &self,
        session_id: &SessionId,
        phase: &mut AgentPhase,
        error: AgentError,
    ) -> AgentError {
        *phase = AgentPhase::Error;
        self.events
            .publish(EngineEvent::run_failed(session_id, error.to_string()));
        error
    }

    fn publish_iteration(&self, session_id: &SessionId, iteration: usize) {
        self.events.publish(EngineEvent::IterationFinished {
            session_id: session_id.to_string(),
            index: iteration as u32,
            timestamp: Utc::now(),
        });
    }
}

/// Concatenated bodies of the visible blocks, one line per block.
fn visible_text(blocks: &[ContentBlock]) -> String {
    let pieces: Vec<&str> = blocks
        .iter()
        .filter(|b| b.kind.is_visible())
        .map(|b| b.text.trim())
        .filter(|t| !t.is_empty())
        .collect();
    pieces.join("\n")
}
