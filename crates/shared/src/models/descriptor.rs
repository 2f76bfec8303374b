use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Framework {
    PyTorch,
    TensorFlow,
    #[serde(rename = "ONNX")]
    Onnx,
    #[default]
    Unknown,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Framework::PyTorch => "PyTorch",
            Framework::TensorFlow => "TensorFlow",
            Framework::Onnx => "ONNX",
            Framework::Unknown => "Unknown",
        };
        write!(f, "{name}")
    }
}

/// Deployment configuration derived from an uploaded model artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub framework: Framework,
    pub base_image: String,
    pub dependencies: Vec<String>,
    /// `host:container` pairs.
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
}

impl ModelDescriptor {
    pub fn readme(&self) -> String {
        format!(
            "Framework: {}\nDependencies: {}",
            self.framework,
            self.dependencies.join(", ")
        )
    }

    pub fn container_port(&self) -> String {
        self.ports.join(",")
    }

    pub fn primary_volume(&self) -> Option<&str> {
        self.volumes.first().map(String::as_str)
    }
}
