use super::ledger::{DeploymentStep, Transition};
use log::debug;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// One ledger transition together with the full step list right after it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentEvent {
    pub run_id: Uuid,
    pub transition: Transition,
    pub steps: Vec<DeploymentStep>,
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &DeploymentEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&DeploymentEvent) + Send + Sync,
{
    fn on_progress(&self, event: &DeploymentEvent) {
        self(event)
    }
}

/// Forwards every event to an async consumer. A closed receiver is not an
/// error for the run.
pub struct ChannelObserver {
    sender: UnboundedSender<DeploymentEvent>,
}

impl ChannelObserver {
    pub fn new(sender: UnboundedSender<DeploymentEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, event: &DeploymentEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!("Progress receiver dropped for run {}", event.run_id);
        }
    }
}
