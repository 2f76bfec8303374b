mod client;

pub use client::ProviderClient;
pub use client::DEFAULT_PROVIDER_URL;

use crate::models::container::{ContainerRequest, ContainerStatus, DeployedContainer};
use crate::models::gpu::GpuOffer;
use crate::models::model::{CreatedModel, DeployedModelView, ModelRequest};
use crate::models::volume::{CreatedVolume, VolumeRequest, VolumeUpdate, VolumeView};
use crate::models::{ConnectionHealth, ProviderResult};
use async_trait::async_trait;
use serde_json::Value;

/// Read side of the provider used by dashboards.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn list_models(&self) -> ProviderResult<Vec<DeployedModelView>>;
}

/// Model, volume and container management on the GPU provider.
///
/// Every call issues exactly one request and never retries.
#[async_trait]
pub trait ResourceProvider: ModelCatalog {
    async fn create_model(&self, request: &ModelRequest) -> ProviderResult<CreatedModel>;
    async fn delete_model(&self, identifier: &str) -> ProviderResult<Value>;

    async fn list_volumes(&self) -> ProviderResult<Vec<VolumeView>>;
    async fn create_volume(&self, request: &VolumeRequest) -> ProviderResult<CreatedVolume>;
    async fn update_volume(&self, update: &VolumeUpdate) -> ProviderResult<Value>;
    async fn delete_volume(&self, identifier: &str) -> ProviderResult<Value>;

    async fn deploy_container(
        &self,
        request: &ContainerRequest,
    ) -> ProviderResult<DeployedContainer>;
    async fn container_status(&self, container_id: &str) -> ProviderResult<ContainerStatus>;
    async fn delete_container(&self, address: &str) -> ProviderResult<Value>;

    /// GPU offers the provider currently marks as available.
    async fn list_gpus(&self) -> ProviderResult<Vec<GpuOffer>>;

    async fn check_connection(&self) -> ProviderResult<ConnectionHealth>;
}
