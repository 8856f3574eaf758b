use crate::validation::types::{AdminDecision, DecisionError, DecisionRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Producer of administrator decisions.
///
/// Exactly one decision is expected per request. Implementations may take
/// arbitrarily long; callers bound the wait themselves.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    async fn await_decision(&self, request: &DecisionRequest)
    -> Result<AdminDecision, DecisionError>;
}

/// Replays prepared decisions in order
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    queue: Mutex<VecDeque<AdminDecision>>,
    delay: Option<Duration>,
}

impl ScriptedDecisions {
    pub fn new(decisions: impl IntoIterator<Item = AdminDecision>) -> Self {
        Self {
            queue: Mutex::new(decisions.into_iter().collect()),
            delay: None,
        }
    }

    /// Hold every decision back for `delay` before delivering it
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push(&self, decision: AdminDecision) {
        self.queue.lock().await.push_back(decision);
    }

    pub async fn remaining(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecisions {
    async fn await_decision(
        &self,
        request: &DecisionRequest,
    ) -> Result<AdminDecision, DecisionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let decision = self
            .queue
            .lock()
            .await
            .pop_front()
            .ok_or(DecisionError::Exhausted)?;

        debug!(
            "Scripted decision for question {} attempt {}: {}",
            request.question_id, request.attempt, decision.kind
        );
        Ok(decision)
    }
}

/// Decisions pushed by an external administrator through an [`AdminHandle`]
#[derive(Debug)]
pub struct ChannelDecisions {
    receiver: Mutex<mpsc::Receiver<AdminDecision>>,
}

/// Sending half used by whoever plays the administrator
#[derive(Debug, Clone)]
pub struct AdminHandle {
    sender: mpsc::Sender<AdminDecision>,
}

/// Create a connected administrator handle and decision source
pub fn admin_channel(buffer: usize) -> (AdminHandle, ChannelDecisions) {
    let (sender, receiver) = mpsc::channel(buffer.max(1));
    (
        AdminHandle { sender },
        ChannelDecisions {
            receiver: Mutex::new(receiver),
        },
    )
}

impl AdminHandle {
    pub async fn decide(&self, decision: AdminDecision) -> Result<(), DecisionError> {
        self.sender
            .send(decision)
            .await
            .map_err(|_| DecisionError::Closed)
    }
}

#[async_trait]
impl DecisionSource for ChannelDecisions {
    async fn await_decision(
        &self,
        request: &DecisionRequest,
    ) -> Result<AdminDecision, DecisionError> {
        debug!(
            "Waiting on administrator channel for request {}",
            request.request_id
        );
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await.ok_or(DecisionError::Closed)
    }
}
