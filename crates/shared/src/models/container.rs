use crate::models::validation::{require, require_positive, RequestValidationError};
use crate::models::wire::string_or_number;
use serde::{Deserialize, Serialize};

pub const DEFAULT_GPU_TYPE: &str = "NVIDIA GeForce RTX 3090 Ti";
pub const DEFAULT_GPU_COUNT: u32 = 1;
pub const RUNNING_STATUS: &str = "running";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerRequest {
    pub model_id: u64,
    pub gpu_count: u32,
    pub gpu_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_container_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_container_address: Option<String>,
}

impl ContainerRequest {
    pub fn builder(model_id: u64) -> ContainerRequestBuilder {
        ContainerRequestBuilder {
            model_id,
            gpu_count: DEFAULT_GPU_COUNT,
            gpu_type: DEFAULT_GPU_TYPE.to_string(),
            existing_container_address: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContainerRequestBuilder {
    model_id: u64,
    gpu_count: u32,
    gpu_type: String,
    existing_container_address: Option<String>,
}

impl ContainerRequestBuilder {
    pub fn gpu_count(mut self, gpu_count: u32) -> Self {
        self.gpu_count = gpu_count;
        self
    }

    pub fn gpu_type(mut self, gpu_type: impl Into<String>) -> Self {
        self.gpu_type = gpu_type.into();
        self
    }

    /// Redeploy onto an already running container instead of a fresh one.
    pub fn existing_container(mut self, address: impl Into<String>) -> Self {
        self.existing_container_address = Some(address.into());
        self
    }

    pub fn build(self) -> Result<ContainerRequest, RequestValidationError> {
        require_positive("gpu_count", self.gpu_count)?;
        require("gpu_type", &self.gpu_type)?;
        Ok(ContainerRequest {
            model_id: self.model_id,
            gpu_count: self.gpu_count,
            gpu_type: self.gpu_type,
            volume_container_identifier: None,
            existing_container_address: self.existing_container_address,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployedContainer {
    #[serde(deserialize_with = "string_or_number")]
    pub container_id: String,
    #[serde(default)]
    pub public_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContainerStats {
    pub status: String,
    pub cpu_usage: Option<String>,
    pub ram_usage: Option<String>,
    pub total_ram: Option<String>,
    pub ram_percentage: Option<String>,
    pub used_volume: Option<String>,
    pub total_volume: Option<String>,
    pub used_container_disk: Option<String>,
    pub total_container_disk: Option<String>,
    pub used_container_disk_percentage: Option<String>,
    pub used_volume_percentage: Option<String>,
    pub uptime: Option<String>,
    pub created: Option<String>,
}

impl ContainerStats {
    pub fn is_running(&self) -> bool {
        self.status == RUNNING_STATUS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerStatus {
    pub container_stats: ContainerStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_request_defaults() {
        let request = ContainerRequest::builder(12).build().unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "model_id": 12,
                "gpu_count": 1,
                "gpu_type": "NVIDIA GeForce RTX 3090 Ti"
            })
        );

        let request = ContainerRequest::builder(12)
            .existing_container("10.0.0.9")
            .build()
            .unwrap();
        assert_eq!(
            request.existing_container_address.as_deref(),
            Some("10.0.0.9")
        );
    }

    #[test]
    fn test_zero_gpus_rejected() {
        let err = ContainerRequest::builder(12).gpu_count(0).build().unwrap_err();
        assert_eq!(err, RequestValidationError::ZeroQuantity { field: "gpu_count" });
    }

    #[test]
    fn test_container_id_accepts_numbers() {
        let container: DeployedContainer = serde_json::from_value(serde_json::json!({
            "success": true,
            "container_id": 991,
            "public_urls": ["https://a.gpulab.example"]
        }))
        .unwrap();
        assert_eq!(container.container_id, "991");
        assert_eq!(container.public_urls.len(), 1);
    }

    #[test]
    fn test_container_stats_running() {
        let status: ContainerStatus = serde_json::from_value(serde_json::json!({
            "success": true,
            "container_stats": {"status": "running", "uptime": "3m"}
        }))
        .unwrap();
        assert!(status.container_stats.is_running());
        assert_eq!(status.container_stats.uptime.as_deref(), Some("3m"));
    }
}
