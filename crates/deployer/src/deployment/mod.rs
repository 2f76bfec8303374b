pub mod ledger;
pub mod observer;

use crate::analyzer::ModelArtifact;
use ledger::{DeploymentStep, LedgerError, StepId, StepLedger, Transition};
use log::{error, info, warn};
use observer::{DeploymentEvent, ProgressObserver};
use serde::{Deserialize, Serialize};
use shared::models::container::ContainerRequest;
use shared::models::model::ModelRequest;
use shared::models::volume::VolumeRequest;
use shared::models::{ModelDescriptor, RequestValidationError};
use shared::provider::ResourceProvider;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Caller supplied deployment preferences. The GPU, disk, environment and
/// existing container settings reach the provider; the rest is carried for
/// the record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ResourceConfig {
    pub gpu_memory_fraction: Option<f64>,
    pub cpu_limit: Option<String>,
    pub network_tier: Option<String>,
    pub auto_scaling: bool,
    pub monitoring: bool,
    pub gpu_count: Option<u32>,
    pub gpu_type: Option<String>,
    pub min_vram: Option<u32>,
    pub container_disk: Option<u32>,
    pub volume_disk: Option<u32>,
    pub env_vars: HashMap<String, String>,
    pub existing_container_address: Option<String>,
}

impl ResourceConfig {
    fn model_request(
        &self,
        artifact: &ModelArtifact,
        descriptor: &ModelDescriptor,
        author_url: &str,
    ) -> Result<ModelRequest, RequestValidationError> {
        let mut model = ModelRequest::for_descriptor(artifact.name.clone(), descriptor)
            .author_url(author_url);
        if let Some(min_vram) = self.min_vram {
            model = model.min_vram(min_vram);
        }
        if let Some(gigabytes) = self.container_disk {
            model = model.container_disk(gigabytes);
        }
        if let Some(gigabytes) = self.volume_disk {
            model = model.volume_disk(gigabytes);
        }
        for (key, value) in &self.env_vars {
            model = model.env_var(key.clone(), value.clone());
        }
        model.build()
    }

    /// Container request without the model and volume, which do not exist yet.
    fn container_template(&self) -> Result<ContainerRequest, RequestValidationError> {
        let mut container = ContainerRequest::builder(0);
        if let Some(gpu_count) = self.gpu_count {
            container = container.gpu_count(gpu_count);
        }
        if let Some(gpu_type) = &self.gpu_type {
            container = container.gpu_type(gpu_type.clone());
        }
        if let Some(address) = &self.existing_container_address {
            container = container.existing_container(address.clone());
        }
        container.build()
    }
}

/// Provider resources created by a run so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CreatedResources {
    pub model_id: Option<u64>,
    pub volume_identifier: Option<String>,
    pub container_id: Option<String>,
}

impl CreatedResources {
    pub fn any(&self) -> bool {
        self.model_id.is_some() || self.volume_identifier.is_some() || self.container_id.is_some()
    }
}

impl fmt::Display for CreatedResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = self.model_id {
            parts.push(format!("model {id}"));
        }
        if let Some(id) = &self.volume_identifier {
            parts.push(format!("volume {id}"));
        }
        if let Some(id) = &self.container_id {
            parts.push(format!("container {id}"));
        }
        if parts.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentOutcome {
    pub run_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created: CreatedResources,
    pub steps: Vec<DeploymentStep>,
}

/// Per-run state: the ledger, what has been created and who is listening.
struct DeploymentRun<'a> {
    id: Uuid,
    ledger: StepLedger,
    created: CreatedResources,
    observer: &'a dyn ProgressObserver,
}

impl<'a> DeploymentRun<'a> {
    fn new(observer: &'a dyn ProgressObserver) -> Self {
        Self {
            id: Uuid::new_v4(),
            ledger: StepLedger::new(),
            created: CreatedResources::default(),
            observer,
        }
    }

    fn enter(&mut self, step: StepId) -> Result<(), String> {
        let transition = self.ledger.start(step).map_err(ledger_message)?;
        self.publish(transition);
        Ok(())
    }

    fn complete(&mut self, step: StepId) -> Result<(), String> {
        let transition = self.ledger.complete(step).map_err(ledger_message)?;
        self.publish(transition);
        Ok(())
    }

    fn fail(&mut self, message: &str) {
        let Some(step) = self.ledger.in_progress() else {
            return;
        };
        match self.ledger.fail(step, message) {
            Ok(transition) => self.publish(transition),
            Err(e) => error!("[{}] {e}", self.id),
        }
    }

    fn publish(&self, transition: Transition) {
        info!(
            "[{}] {} -> {}",
            self.id,
            transition.step.label(),
            transition.to
        );
        let event = DeploymentEvent {
            run_id: self.id,
            transition,
            steps: self.ledger.steps().to_vec(),
        };
        self.observer.on_progress(&event);
    }
}

fn ledger_message(e: LedgerError) -> String {
    error!("Deployment ledger rejected a transition: {e}");
    e.to_string()
}

/// Drives one artifact through model registration, volume creation,
/// container deployment and a single readiness check.
pub struct DeploymentOrchestrator {
    provider: Arc<dyn ResourceProvider>,
    author_url: String,
}

impl DeploymentOrchestrator {
    pub fn new(provider: Arc<dyn ResourceProvider>, author_url: impl Into<String>) -> Self {
        Self {
            provider,
            author_url: author_url.into(),
        }
    }

    /// Runs every stage in order and stops at the first failure.
    ///
    /// Resources created before a failure are NOT deleted; they are listed in
    /// the outcome's `created` field and logged as orphaned.
    pub async fn deploy(
        &self,
        artifact: &ModelArtifact,
        descriptor: &ModelDescriptor,
        resources: &ResourceConfig,
        observer: &dyn ProgressObserver,
    ) -> DeploymentOutcome {
        let mut run = DeploymentRun::new(observer);
        info!(
            "[{}] Deploying {} ({} model)",
            run.id, artifact.name, descriptor.framework
        );

        match self.run_stages(&mut run, artifact, descriptor, resources).await {
            Ok(endpoint) => {
                info!("[{}] Deployment finished, endpoint: {:?}", run.id, endpoint);
                DeploymentOutcome {
                    run_id: run.id,
                    success: run.ledger.is_complete(),
                    endpoint,
                    container_id: run.created.container_id.clone(),
                    error: None,
                    created: run.created,
                    steps: run.ledger.steps().to_vec(),
                }
            }
            Err(message) => {
                error!("[{}] Deployment failed: {message}", run.id);
                run.fail(&message);
                if run.created.any() {
                    warn!(
                        "[{}] No rollback performed, orphaned resources: {}",
                        run.id, run.created
                    );
                }
                DeploymentOutcome {
                    run_id: run.id,
                    success: false,
                    endpoint: None,
                    container_id: run.created.container_id.clone(),
                    error: Some(message),
                    created: run.created,
                    steps: run.ledger.steps().to_vec(),
                }
            }
        }
    }

    async fn run_stages(
        &self,
        run: &mut DeploymentRun<'_>,
        artifact: &ModelArtifact,
        descriptor: &ModelDescriptor,
        resources: &ResourceConfig,
    ) -> Result<Option<String>, String> {
        run.enter(StepId::Analyze)?;
        // Every payload is validated before the first remote call.
        let model = resources
            .model_request(artifact, descriptor, &self.author_url)
            .map_err(|e| e.to_string())?;
        let volume = VolumeRequest::for_artifact(&artifact.name)
            .build()
            .map_err(|e| e.to_string())?;
        let container = resources.container_template().map_err(|e| e.to_string())?;

        let model = self
            .provider
            .create_model(&model)
            .await
            .into_result("Failed to create model")?;
        run.created.model_id = Some(model.id);
        run.complete(StepId::Analyze)?;

        run.enter(StepId::Build)?;
        let volume = self
            .provider
            .create_volume(&volume)
            .await
            .into_result("Failed to create network volume")?;
        run.created.volume_identifier = Some(volume.volume_server_identifier.clone());
        run.complete(StepId::Build)?;

        run.enter(StepId::Configure)?;
        let container = ContainerRequest {
            model_id: model.id,
            volume_container_identifier: Some(volume.volume_server_identifier),
            ..container
        };
        let deployed = self
            .provider
            .deploy_container(&container)
            .await
            .into_result("Failed to deploy container")?;
        run.created.container_id = Some(deployed.container_id.clone());
        run.complete(StepId::Configure)?;

        run.enter(StepId::Deploy)?;
        let status = self
            .provider
            .container_status(&deployed.container_id)
            .await
            .into_result("Container failed to start")?;
        if !status.container_stats.is_running() {
            return Err(format!(
                "Container failed to start (status: {})",
                status.container_stats.status
            ));
        }
        run.complete(StepId::Deploy)?;

        Ok(deployed.public_urls.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use ledger::StepStatus;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use shared::provider::ProviderClient;
    use std::sync::Mutex;

    fn orchestrator(server: &ServerGuard) -> DeploymentOrchestrator {
        let client = ProviderClient::new(&server.url(), "test-key", None).unwrap();
        DeploymentOrchestrator::new(Arc::new(client), "https://market.example")
    }

    fn artifact() -> ModelArtifact {
        ModelArtifact::new("model_pytorch.bin", 1024)
    }

    fn statuses(steps: &[DeploymentStep]) -> Vec<StepStatus> {
        steps.iter().map(|s| s.status).collect()
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<DeploymentEvent>>,
    }

    impl ProgressObserver for Recorder {
        fn on_progress(&self, event: &DeploymentEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_model_creation_failure_stops_the_run() {
        let mut server = Server::new_async().await;
        let model_mock = server
            .mock("POST", "/model-upload")
            .with_status(200)
            .with_body(r#"{"success": false, "message": "quota exceeded"}"#)
            .create_async()
            .await;
        let volume_mock = server
            .mock("POST", "/nas-server")
            .expect(0)
            .create_async()
            .await;

        let descriptor = analyze(&artifact()).unwrap();
        let recorder = Recorder::default();
        let outcome = orchestrator(&server)
            .deploy(&artifact(), &descriptor, &ResourceConfig::default(), &recorder)
            .await;

        model_mock.assert_async().await;
        volume_mock.assert_async().await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("quota exceeded"));
        assert_eq!(
            statuses(&outcome.steps),
            vec![
                StepStatus::Failed,
                StepStatus::Pending,
                StepStatus::Pending,
                StepStatus::Pending
            ]
        );
        assert_eq!(outcome.steps[0].message.as_deref(), Some("quota exceeded"));
        assert!(!outcome.created.any());
        assert_eq!(recorder.events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_successful_deployment() {
        let mut server = Server::new_async().await;
        let model_mock = server
            .mock("POST", "/model-upload")
            .match_header("api-key", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "name": "model_pytorch.bin",
                "image_name": "pytorch/pytorch:2.0.0-cuda11.7-cudnn8-runtime",
                "author_url": "https://market.example",
                "container_port": "8000:8000",
                "volume_mount_path": "/model-data",
                "readme": "Framework: PyTorch\nDependencies: torch==2.0.0, numpy==1.24.3, flask==2.0.1, torchvision==0.15.0"
            })))
            .with_status(200)
            .with_body(r#"{"success": true, "id": 42}"#)
            .create_async()
            .await;
        let volume_mock = server
            .mock("POST", "/nas-server")
            .match_body(Matcher::Json(json!({
                "template_name": "model_pytorch.bin-volume",
                "volume_space": 100,
                "unit": "GB"
            })))
            .with_status(200)
            .with_body(r#"{"success": true, "volume_server_identifier": "vol-7"}"#)
            .create_async()
            .await;
        let container_mock = server
            .mock("POST", "/container/deploy")
            .match_body(Matcher::PartialJson(json!({
                "model_id": 42,
                "gpu_count": 1,
                "gpu_type": "NVIDIA GeForce RTX 3090 Ti",
                "volume_container_identifier": "vol-7"
            })))
            .with_status(200)
            .with_body(
                r#"{"success": true, "container_id": "c-1", "public_urls": ["https://c-1.gpulab.ai", "https://alt"]}"#,
            )
            .create_async()
            .await;
        let status_mock = server
            .mock("GET", "/containerstats")
            .match_query(Matcher::UrlEncoded("container_id".into(), "c-1".into()))
            .with_status(200)
            .with_body(r#"{"success": true, "container_stats": {"status": "running"}}"#)
            .create_async()
            .await;

        let descriptor = analyze(&artifact()).unwrap();
        let recorder = Recorder::default();
        let outcome = orchestrator(&server)
            .deploy(&artifact(), &descriptor, &ResourceConfig::default(), &recorder)
            .await;

        model_mock.assert_async().await;
        volume_mock.assert_async().await;
        container_mock.assert_async().await;
        status_mock.assert_async().await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.endpoint.as_deref(), Some("https://c-1.gpulab.ai"));
        assert_eq!(outcome.container_id.as_deref(), Some("c-1"));
        assert_eq!(outcome.created.model_id, Some(42));
        assert!(outcome
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Completed));

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 8);
        assert!(events.iter().all(|e| e.run_id == outcome.run_id));
        for event in events.iter() {
            let in_progress = event
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::InProgress)
                .count();
            assert!(in_progress <= 1);
        }
        assert_eq!(events[0].transition.step, StepId::Analyze);
        assert_eq!(events[0].transition.to, StepStatus::InProgress);
    }

    #[tokio::test]
    async fn test_container_not_running_fails_deploy_step() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/model-upload")
            .with_body(r#"{"success": true, "id": 1}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/nas-server")
            .with_body(r#"{"success": true, "volume_server_identifier": "vol-1"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/container/deploy")
            .with_body(r#"{"success": true, "container_id": 99, "public_urls": []}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/containerstats")
            .match_query(Matcher::Any)
            .with_body(r#"{"success": true, "container_stats": {"status": "exited"}}"#)
            .create_async()
            .await;

        let descriptor = analyze(&artifact()).unwrap();
        let outcome = orchestrator(&server)
            .deploy(
                &artifact(),
                &descriptor,
                &ResourceConfig::default(),
                &|_: &DeploymentEvent| {},
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Container failed to start (status: exited)")
        );
        assert_eq!(
            statuses(&outcome.steps),
            vec![
                StepStatus::Completed,
                StepStatus::Completed,
                StepStatus::Completed,
                StepStatus::Failed
            ]
        );
        assert_eq!(
            outcome.created,
            CreatedResources {
                model_id: Some(1),
                volume_identifier: Some("vol-1".to_string()),
                container_id: Some("99".to_string()),
            }
        );
        assert_eq!(
            outcome.created.to_string(),
            "model 1, volume vol-1, container 99"
        );
    }

    #[tokio::test]
    async fn test_resource_overrides_reach_container_request() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/model-upload")
            .with_body(r#"{"success": true, "id": 5}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/nas-server")
            .with_body(r#"{"success": true, "volume_server_identifier": "vol-5"}"#)
            .create_async()
            .await;
        let container_mock = server
            .mock("POST", "/container/deploy")
            .match_body(Matcher::PartialJson(json!({
                "gpu_count": 2,
                "gpu_type": "NVIDIA A100"
            })))
            .with_status(500)
            .with_body(r#"{"error": "no capacity"}"#)
            .create_async()
            .await;

        let resources = ResourceConfig {
            gpu_count: Some(2),
            gpu_type: Some("NVIDIA A100".to_string()),
            ..Default::default()
        };
        let descriptor = analyze(&artifact()).unwrap();
        let outcome = orchestrator(&server)
            .deploy(&artifact(), &descriptor, &resources, &|_: &DeploymentEvent| {})
            .await;

        container_mock.assert_async().await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("no capacity"));
        assert_eq!(outcome.steps[2].status, StepStatus::Failed);
        assert_eq!(outcome.steps[3].status, StepStatus::Pending);
        assert_eq!(outcome.created.volume_identifier.as_deref(), Some("vol-5"));
    }

    #[tokio::test]
    async fn test_invalid_gpu_override_fails_before_dispatch() {
        let mut server = Server::new_async().await;
        let model_mock = server
            .mock("POST", "/model-upload")
            .expect(0)
            .create_async()
            .await;
        let volume_mock = server
            .mock("POST", "/nas-server")
            .expect(0)
            .create_async()
            .await;

        let descriptor = analyze(&artifact()).unwrap();
        for resources in [
            ResourceConfig {
                gpu_count: Some(0),
                ..Default::default()
            },
            ResourceConfig {
                gpu_type: Some(String::new()),
                ..Default::default()
            },
        ] {
            let outcome = orchestrator(&server)
                .deploy(&artifact(), &descriptor, &resources, &|_: &DeploymentEvent| {})
                .await;

            assert!(!outcome.success);
            assert_eq!(
                statuses(&outcome.steps),
                vec![
                    StepStatus::Failed,
                    StepStatus::Pending,
                    StepStatus::Pending,
                    StepStatus::Pending
                ]
            );
            assert!(!outcome.created.any());
        }

        model_mock.assert_async().await;
        volume_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_disk_env_and_existing_container_reach_provider() {
        let mut server = Server::new_async().await;
        let model_mock = server
            .mock("POST", "/model-upload")
            .match_body(Matcher::PartialJson(json!({
                "min_vram": 24,
                "container_disk": 40,
                "volume_disk": 80,
                "env_vars": {"HF_HOME": "/model-data/hf"}
            })))
            .with_body(r#"{"success": true, "id": 8}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/nas-server")
            .with_body(r#"{"success": true, "volume_server_identifier": "vol-8"}"#)
            .create_async()
            .await;
        let container_mock = server
            .mock("POST", "/container/deploy")
            .match_body(Matcher::PartialJson(json!({
                "model_id": 8,
                "volume_container_identifier": "vol-8",
                "existing_container_address": "10.0.0.9"
            })))
            .with_body(r#"{"success": true, "container_id": "c-8"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/containerstats")
            .match_query(Matcher::Any)
            .with_body(r#"{"success": true, "container_stats": {"status": "running"}}"#)
            .create_async()
            .await;

        let resources = ResourceConfig {
            min_vram: Some(24),
            container_disk: Some(40),
            volume_disk: Some(80),
            env_vars: HashMap::from([("HF_HOME".to_string(), "/model-data/hf".to_string())]),
            existing_container_address: Some("10.0.0.9".to_string()),
            ..Default::default()
        };
        let descriptor = analyze(&artifact()).unwrap();
        let outcome = orchestrator(&server)
            .deploy(&artifact(), &descriptor, &resources, &|_: &DeploymentEvent| {})
            .await;

        model_mock.assert_async().await;
        container_mock.assert_async().await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.endpoint, None);
    }

    #[tokio::test]
    async fn test_zero_container_disk_fails_before_dispatch() {
        let mut server = Server::new_async().await;
        let model_mock = server
            .mock("POST", "/model-upload")
            .expect(0)
            .create_async()
            .await;

        let resources = ResourceConfig {
            container_disk: Some(0),
            ..Default::default()
        };
        let descriptor = analyze(&artifact()).unwrap();
        let outcome = orchestrator(&server)
            .deploy(&artifact(), &descriptor, &resources, &|_: &DeploymentEvent| {})
            .await;

        model_mock.assert_async().await;
        assert_eq!(
            outcome.error.as_deref(),
            Some("container_disk must be greater than zero")
        );
        assert_eq!(outcome.steps[0].status, StepStatus::Failed);
    }
}
