use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StepId {
    Analyze,
    Build,
    Configure,
    Deploy,
}

impl StepId {
    pub const ORDER: [StepId; 4] = [
        StepId::Analyze,
        StepId::Build,
        StepId::Configure,
        StepId::Deploy,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StepId::Analyze => "Analyzing Model",
            StepId::Build => "Building Docker Image",
            StepId::Configure => "Configuring Resources",
            StepId::Deploy => "Deploying Container",
        }
    }

    fn position(self) -> usize {
        match self {
            StepId::Analyze => 0,
            StepId::Build => 1,
            StepId::Configure => 2,
            StepId::Deploy => 3,
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self {
            StepId::Analyze => "analyze",
            StepId::Build => "build",
            StepId::Configure => "configure",
            StepId::Deploy => "deploy",
        };
        write!(f, "{id}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in-progress",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        };
        write!(f, "{status}")
    }
}

/// Every legal status change of a single step.
const TRANSITIONS: [(StepStatus, StepStatus); 3] = [
    (StepStatus::Pending, StepStatus::InProgress),
    (StepStatus::InProgress, StepStatus::Completed),
    (StepStatus::InProgress, StepStatus::Failed),
];

impl StepStatus {
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        TRANSITIONS.contains(&(self, next))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentStep {
    pub id: StepId,
    pub name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub step: StepId,
    pub from: StepStatus,
    pub to: StepStatus,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    #[error("step {step} cannot move from {from} to {to}")]
    InvalidTransition {
        step: StepId,
        from: StepStatus,
        to: StepStatus,
    },
    #[error("step {step} cannot start while {blocking} is {status}")]
    OutOfOrder {
        step: StepId,
        blocking: StepId,
        status: StepStatus,
    },
}

/// Ordered status of the four deployment steps of a single run.
///
/// A step may only start once every earlier step has completed, so at most
/// one step is ever in progress and nothing after a failed step leaves
/// `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepLedger {
    steps: Vec<DeploymentStep>,
}

impl Default for StepLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl StepLedger {
    pub fn new() -> Self {
        Self {
            steps: StepId::ORDER
                .iter()
                .map(|id| DeploymentStep {
                    id: *id,
                    name: id.label().to_string(),
                    status: StepStatus::Pending,
                    message: None,
                })
                .collect(),
        }
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn in_progress(&self) -> Option<StepId> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::InProgress)
            .map(|s| s.id)
    }

    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    pub fn start(&mut self, step: StepId) -> Result<Transition, LedgerError> {
        if let Some(blocking) = self.steps[..step.position()]
            .iter()
            .find(|s| s.status != StepStatus::Completed)
        {
            return Err(LedgerError::OutOfOrder {
                step,
                blocking: blocking.id,
                status: blocking.status,
            });
        }
        self.transition(step, StepStatus::InProgress, None)
    }

    pub fn complete(&mut self, step: StepId) -> Result<Transition, LedgerError> {
        self.transition(step, StepStatus::Completed, None)
    }

    pub fn fail(&mut self, step: StepId, message: impl Into<String>) -> Result<Transition, LedgerError> {
        self.transition(step, StepStatus::Failed, Some(message.into()))
    }

    fn transition(
        &mut self,
        step: StepId,
        to: StepStatus,
        message: Option<String>,
    ) -> Result<Transition, LedgerError> {
        let entry = &mut self.steps[step.position()];
        let from = entry.status;
        if !from.can_transition_to(to) {
            return Err(LedgerError::InvalidTransition { step, from, to });
        }
        entry.status = to;
        if message.is_some() {
            entry.message = message;
        }
        Ok(Transition { step, from, to })
    }
}
