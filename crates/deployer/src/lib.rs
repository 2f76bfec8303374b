pub mod analyzer;
pub mod api;
pub mod cli;
pub mod config;
pub mod deployment;
pub mod poller;
pub mod utils;

pub use analyzer::{analyze, AnalyzeError, ModelArtifact};
pub use cli::{execute, Cli};
pub use config::DeployerConfig;
pub use deployment::{DeploymentOrchestrator, DeploymentOutcome, ResourceConfig};
pub use poller::{DashboardSnapshot, StatusPoller};
pub use utils::loop_heartbeats::LoopHeartbeats;
