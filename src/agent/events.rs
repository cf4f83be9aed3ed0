//! Events emitted by a running turn, and the channel that carries them.

use super::Agent;
use crate::error::{Result, SkiffError};
use crate::tools::ToolIndicator;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Bound on buffered events between the agent and the front-end.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// How long the producer waits on a full channel before dropping an event.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { answer: String },
    IterationLimit { iterations: usize },
    Failed { error: String },
    Cancelled,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Prose the model wrote before its tool calls.
    Text(String),
    /// The final answer of the turn.
    Answer(String),
    ToolStarted {
        name: String,
        indicator: ToolIndicator,
        label: String,
    },
    ToolFinished {
        name: String,
        success: bool,
        elapsed: Duration,
        /// Output cut to the configured preview length.
        preview: String,
        error: Option<String>,
    },
    Warning(String),
    Error(String),
    /// Always the last event of a turn.
    Finished(TurnOutcome),
}

/// Producer side of the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
    cancel: CancellationToken,
    send_timeout: Duration,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<AgentEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            send_timeout: SEND_TIMEOUT,
        }
    }

    /// A sink plus the receiver for it, sized [`EVENT_CHANNEL_CAPACITY`].
    pub fn channel(cancel: CancellationToken) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self::new(tx, cancel), rx)
    }

    /// Deliver an event, waiting a bounded time if the consumer lags.
    ///
    /// Returns `false` when the event was dropped.
    pub async fn emit(&self, event: AgentEvent) -> bool {
        let event = match self.tx.try_send(event) {
            Ok(()) => return true,
            Err(TrySendError::Closed(_)) => return false,
            Err(TrySendError::Full(event)) => event,
        };

        tokio::select! {
            biased;
            sent = tokio::time::timeout(self.send_timeout, self.tx.send(event)) => match sent {
                Ok(Ok(())) => true,
                Ok(Err(_)) => false,
                Err(_) => {
                    warn!("Event channel full for {:?}, dropping event", self.send_timeout);
                    false
                }
            },
            _ = self.cancel.cancelled() => {
                debug!("Turn cancelled while the event channel was full");
                false
            }
        }
    }

    /// Deliver the closing event. Ignores cancellation so the consumer always
    /// learns how the turn ended.
    pub async fn finish(&self, outcome: TurnOutcome) {
        let sent = tokio::time::timeout(
            self.send_timeout,
            self.tx.send(AgentEvent::Finished(outcome)),
        );
        match sent.await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!("Event receiver gone before turn finished"),
            Err(_) => warn!("Event channel full, dropping turn outcome"),
        }
    }
}

/// A turn running on its own task. Owns the agent until [`finish`](Self::finish).
pub struct TurnHandle {
    events: mpsc::Receiver<AgentEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Agent>,
}

impl TurnHandle {
    pub(crate) fn new(
        events: mpsc::Receiver<AgentEvent>,
        cancel: CancellationToken,
        task: JoinHandle<Agent>,
    ) -> Self {
        Self {
            events,
            cancel,
            task,
        }
    }

    /// Wait for the next event. `None` once the turn task has dropped its sink.
    pub async fn next_event(&mut self) -> Option<AgentEvent> {
        self.events.recv().await
    }

    /// Non-blocking poll for the next event.
    pub fn try_next_event(&mut self) -> Option<AgentEvent> {
        self.events.try_recv().ok()
    }

    /// Ask the turn to stop at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the turn task and take the agent back.
    ///
    /// Events not yet received are discarded.
    pub async fn finish(self) -> Result<Agent> {
        drop(self.events);
        self.task
            .await
            .map_err(|e| SkiffError::Agent(format!("turn task failed: {}", e)))
    }
}
