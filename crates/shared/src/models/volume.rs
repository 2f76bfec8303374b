use crate::models::validation::{require, require_positive, RequestValidationError};
use crate::models::wire::{null_as_default, string_or_number};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_VOLUME_SPACE: u32 = 100;
pub const DEFAULT_VOLUME_UNIT: &str = "GB";

/// Network volume (NAS server) provisioning request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeRequest {
    pub template_name: String,
    pub volume_space: u32,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_type: Option<String>,
}

impl VolumeRequest {
    pub fn builder(template_name: impl Into<String>) -> VolumeRequestBuilder {
        VolumeRequestBuilder {
            template_name: template_name.into(),
            volume_space: DEFAULT_VOLUME_SPACE,
            unit: DEFAULT_VOLUME_UNIT.to_string(),
            region_type: None,
        }
    }

    /// Volume named after the artifact it will hold, e.g. `model.pt-volume`.
    pub fn for_artifact(artifact_name: &str) -> VolumeRequestBuilder {
        Self::builder(format!("{artifact_name}-volume"))
    }
}

#[derive(Debug, Clone)]
pub struct VolumeRequestBuilder {
    template_name: String,
    volume_space: u32,
    unit: String,
    region_type: Option<String>,
}

impl VolumeRequestBuilder {
    pub fn volume_space(mut self, volume_space: u32) -> Self {
        self.volume_space = volume_space;
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn region_type(mut self, region_type: impl Into<String>) -> Self {
        self.region_type = Some(region_type.into());
        self
    }

    pub fn build(self) -> Result<VolumeRequest, RequestValidationError> {
        require("template_name", &self.template_name)?;
        require("unit", &self.unit)?;
        require_positive("volume_space", self.volume_space)?;
        Ok(VolumeRequest {
            template_name: self.template_name,
            volume_space: self.volume_space,
            unit: self.unit,
            region_type: self.region_type,
        })
    }
}

/// Resize or rename an existing network volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeUpdate {
    pub volume_server_identifier: String,
    #[serde(flatten)]
    pub volume: VolumeRequest,
}

impl VolumeUpdate {
    pub fn new(
        volume_server_identifier: impl Into<String>,
        volume: VolumeRequest,
    ) -> Result<Self, RequestValidationError> {
        let volume_server_identifier = volume_server_identifier.into();
        require("volume_server_identifier", &volume_server_identifier)?;
        Ok(Self {
            volume_server_identifier,
            volume,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedVolume {
    pub volume_server_identifier: String,
}

/// A network volume as reported by the provider's volume listing. Fields
/// beyond these are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeView {
    #[serde(deserialize_with = "string_or_number")]
    pub volume_server_identifier: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub template_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub volume_space: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
