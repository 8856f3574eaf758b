use crate::flow::questions;
use crate::validation::source::DecisionSource;
use crate::validation::types::{AdminDecision, DecisionError, DecisionRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// How the stand-in administrator decides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationPolicy {
    /// Approve every answer
    #[default]
    ApproveAll,
    /// Approve answers found in the question bank, reject the rest
    AnswerKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub delay_secs: u64,
    pub policy: SimulationPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            delay_secs: 3,
            policy: SimulationPolicy::ApproveAll,
        }
    }
}

/// Timer-driven administrator used when no real one is attached
#[derive(Debug, Clone)]
pub struct SimulatedAdmin {
    delay: Duration,
    policy: SimulationPolicy,
}

impl SimulatedAdmin {
    pub fn new(delay: Duration, policy: SimulationPolicy) -> Self {
        Self { delay, policy }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(Duration::from_secs(config.delay_secs), config.policy)
    }

    pub fn decide(&self, request: &DecisionRequest) -> AdminDecision {
        match self.policy {
            SimulationPolicy::ApproveAll => {
                AdminDecision::approved("Your answer was approved by the administrator.")
            }
            SimulationPolicy::AnswerKey => {
                if questions::is_accepted(request.question_id, &request.answer) {
                    AdminDecision::approved("Correct! The administrator approved your answer.")
                } else {
                    AdminDecision::rejected("The administrator rejected your answer.")
                        .with_note(format!("Attempt {} was not accepted", request.attempt))
                        .with_reason("incorrect_answer")
                }
            }
        }
    }
}

#[async_trait]
impl DecisionSource for SimulatedAdmin {
    async fn await_decision(
        &self,
        request: &DecisionRequest,
    ) -> Result<AdminDecision, DecisionError> {
        tokio::time::sleep(self.delay).await;
        let decision = self.decide(request);
        info!(
            "Simulated administrator decided {} for question {}",
            decision.kind, request.question_id
        );
        Ok(decision)
    }
}
