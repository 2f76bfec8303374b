use crate::models::descriptor::ModelDescriptor;
use crate::models::validation::{require, require_positive, RequestValidationError};
use crate::models::wire::null_as_default;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_CATEGORY_ID: u32 = 1;
pub const DEFAULT_MIN_VRAM_GB: u32 = 4;
pub const DEFAULT_CONTAINER_DISK_GB: u32 = 20;
pub const DEFAULT_VOLUME_DISK_GB: u32 = 50;
pub const DEFAULT_DOCKER_COMMAND: &str = "python app.py";
pub const DEFAULT_PORT: &str = "8000:8000";
pub const DEFAULT_MOUNT_PATH: &str = "/model-data";

/// Body of the provider's model registration call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelRequest {
    pub name: String,
    pub image_name: String,
    pub author_url: String,
    pub category_id: u32,
    pub min_vram: u32,
    #[serde(rename = "isVisible")]
    pub is_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub container_port: String,
    pub container_disk: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_id: Option<String>,
    pub volume_disk: u32,
    pub volume_mount_path: String,
    pub docker_command: String,
    pub env_vars: HashMap<String, String>,
    pub readme: String,
}

impl ModelRequest {
    pub fn builder(name: impl Into<String>, image_name: impl Into<String>) -> ModelRequestBuilder {
        ModelRequestBuilder {
            name: name.into(),
            image_name: image_name.into(),
            author_url: String::new(),
            min_vram: DEFAULT_MIN_VRAM_GB,
            ports: vec![DEFAULT_PORT.to_string()],
            container_disk: DEFAULT_CONTAINER_DISK_GB,
            volume_disk: DEFAULT_VOLUME_DISK_GB,
            volume_mount_path: DEFAULT_MOUNT_PATH.to_string(),
            env_vars: HashMap::new(),
            readme: String::new(),
        }
    }

    /// Builder seeded with the image, ports, mount path and readme of a descriptor.
    pub fn for_descriptor(name: impl Into<String>, descriptor: &ModelDescriptor) -> ModelRequestBuilder {
        let mut builder = Self::builder(name, descriptor.base_image.clone())
            .ports(descriptor.ports.clone())
            .readme(descriptor.readme());
        if let Some(path) = descriptor.primary_volume() {
            builder = builder.volume_mount_path(path);
        }
        builder
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequestBuilder {
    name: String,
    image_name: String,
    author_url: String,
    min_vram: u32,
    ports: Vec<String>,
    container_disk: u32,
    volume_disk: u32,
    volume_mount_path: String,
    env_vars: HashMap<String, String>,
    readme: String,
}

impl ModelRequestBuilder {
    pub fn author_url(mut self, author_url: impl Into<String>) -> Self {
        self.author_url = author_url.into();
        self
    }

    pub fn min_vram(mut self, min_vram: u32) -> Self {
        self.min_vram = min_vram;
        self
    }

    pub fn ports(mut self, ports: Vec<String>) -> Self {
        self.ports = ports;
        self
    }

    pub fn container_disk(mut self, gigabytes: u32) -> Self {
        self.container_disk = gigabytes;
        self
    }

    pub fn volume_disk(mut self, gigabytes: u32) -> Self {
        self.volume_disk = gigabytes;
        self
    }

    pub fn volume_mount_path(mut self, path: impl Into<String>) -> Self {
        self.volume_mount_path = path.into();
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    pub fn readme(mut self, readme: impl Into<String>) -> Self {
        self.readme = readme.into();
        self
    }

    pub fn build(self) -> Result<ModelRequest, RequestValidationError> {
        require("name", &self.name)?;
        require("image_name", &self.image_name)?;
        require_positive("container_disk", self.container_disk)?;
        require_positive("volume_disk", self.volume_disk)?;
        if self.ports.is_empty() {
            return Err(RequestValidationError::EmptyField("container_port"));
        }
        for port in &self.ports {
            validate_port_mapping(port)?;
        }
        if !self.volume_mount_path.starts_with('/') {
            return Err(RequestValidationError::RelativeMountPath(
                self.volume_mount_path,
            ));
        }

        Ok(ModelRequest {
            name: self.name,
            image_name: self.image_name,
            author_url: self.author_url,
            category_id: DEFAULT_CATEGORY_ID,
            min_vram: self.min_vram,
            is_visible: true,
            thumbnail_url: None,
            container_port: self.ports.join(","),
            container_disk: self.container_disk,
            credentials_id: None,
            volume_disk: self.volume_disk,
            volume_mount_path: self.volume_mount_path,
            docker_command: DEFAULT_DOCKER_COMMAND.to_string(),
            env_vars: self.env_vars,
            readme: self.readme,
        })
    }
}

fn validate_port_mapping(mapping: &str) -> Result<(), RequestValidationError> {
    let valid = match mapping.split_once(':') {
        Some((host, container)) => host.parse::<u16>().is_ok() && container.parse::<u16>().is_ok(),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RequestValidationError::InvalidPort(mapping.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedModel {
    pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GpuView {
    #[serde(default, deserialize_with = "null_as_default")]
    pub gpu_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mem_used_percent: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gpu_status: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gpuprice: String,
}

/// A deployed model as reported by the provider's model listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeployedModelView {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub container_address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub container_status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub public_urls: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub opened_ports: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gpus: Vec<GpuView>,
}
