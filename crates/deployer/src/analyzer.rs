use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use shared::models::model::{DEFAULT_MOUNT_PATH, DEFAULT_PORT};
use shared::models::{Framework, ModelDescriptor};
use std::path::Path;
use thiserror::Error;

pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["h5", "pkl", "pt", "pth", "onnx", "pb", "bin"];

const GIB: u64 = 1024 * 1024 * 1024;
pub const MAX_ARTIFACT_BYTES: u64 = 10 * GIB;

const NUMPY: &str = "numpy==1.24.3";
const FLASK: &str = "flask==2.0.1";
const TORCHVISION: &str = "torchvision==0.15.0";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalyzeError {
    #[error("Unsupported file format: {0}. Please upload a supported model file.")]
    UnsupportedFormat(String),
    #[error("File size exceeds 10GB limit. Your file: {}GB", format_gib(.size))]
    FileTooLarge { size: u64 },
    #[error("Could not determine the AI framework. Please ensure your model file is from PyTorch, TensorFlow, or ONNX.")]
    UnknownFramework,
}

fn format_gib(size: &u64) -> String {
    format!("{:.2}", *size as f64 / GIB as f64)
}

/// An uploaded model file as seen by the analyzer: its name and size only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    pub name: String,
    pub size_bytes: u64,
}

impl ModelArtifact {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to read metadata for {}", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("{} is not a regular file", path.display());
        }
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("{} has no valid file name", path.display()))?;
        Ok(Self::new(name, metadata.len()))
    }

    /// Lower-cased text after the last dot; the whole name when there is no dot.
    pub fn extension(&self) -> String {
        let name = self.name.to_lowercase();
        match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_string(),
            None => name,
        }
    }
}

/// Derives a deployment descriptor from an artifact's name, extension and size.
///
/// Format and size are rejected before any framework inference. Identical
/// input always yields an identical descriptor.
pub fn analyze(artifact: &ModelArtifact) -> Result<ModelDescriptor, AnalyzeError> {
    debug!("Starting model analysis for file: {}", artifact.name);

    let extension = artifact.extension();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AnalyzeError::UnsupportedFormat(extension));
    }

    if artifact.size_bytes > MAX_ARTIFACT_BYTES {
        return Err(AnalyzeError::FileTooLarge {
            size: artifact.size_bytes,
        });
    }

    let framework = detect_framework(&artifact.name.to_lowercase(), &extension);
    debug!("Detected framework: {framework}");

    let Some(base_image) = base_image(framework) else {
        return Err(AnalyzeError::UnknownFramework);
    };

    Ok(ModelDescriptor {
        framework,
        base_image: base_image.to_string(),
        dependencies: dependencies(framework),
        ports: vec![DEFAULT_PORT.to_string()],
        volumes: vec![DEFAULT_MOUNT_PATH.to_string()],
    })
}

fn detect_framework(lower_name: &str, extension: &str) -> Framework {
    if lower_name.contains("pytorch") || matches!(extension, "pt" | "pth" | "bin") {
        Framework::PyTorch
    } else if lower_name.contains("tensorflow") || matches!(extension, "h5" | "pb") {
        Framework::TensorFlow
    } else if extension == "onnx" {
        Framework::Onnx
    } else {
        Framework::Unknown
    }
}

fn base_image(framework: Framework) -> Option<&'static str> {
    match framework {
        Framework::PyTorch => Some("pytorch/pytorch:2.0.0-cuda11.7-cudnn8-runtime"),
        Framework::TensorFlow => Some("tensorflow/tensorflow:2.13.0-gpu"),
        Framework::Onnx => Some("nvidia/cuda:11.8.0-runtime-ubuntu22.04"),
        Framework::Unknown => None,
    }
}

fn dependencies(framework: Framework) -> Vec<String> {
    let runtime = match framework {
        Framework::PyTorch => "torch==2.0.0",
        Framework::TensorFlow => "tensorflow==2.13.0",
        Framework::Onnx | Framework::Unknown => "onnxruntime-gpu==1.15.1",
    };
    let mut deps = vec![runtime.to_string(), NUMPY.to_string(), FLASK.to_string()];
    if framework == Framework::PyTorch {
        deps.push(TORCHVISION.to_string());
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str) -> ModelArtifact {
        ModelArtifact::new(name, 512 * 1024 * 1024)
    }

    #[test]
    fn test_pytorch_hint_in_name() {
        let descriptor = analyze(&artifact("model_pytorch.bin")).unwrap();
        assert_eq!(descriptor.framework, Framework::PyTorch);
        assert!(descriptor.base_image.contains("pytorch"));
        assert!(descriptor.dependencies.iter().any(|d| d.starts_with("torch==")));
        assert!(descriptor.dependencies.iter().any(|d| d.starts_with("torchvision==")));
        assert_eq!(descriptor.ports, vec!["8000:8000".to_string()]);
        assert_eq!(descriptor.volumes, vec!["/model-data".to_string()]);
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(analyze(&artifact("weights.h5")).unwrap().framework, Framework::TensorFlow);
        assert_eq!(analyze(&artifact("graph.pb")).unwrap().framework, Framework::TensorFlow);
        assert_eq!(analyze(&artifact("graph.onnx")).unwrap().framework, Framework::Onnx);
        assert_eq!(analyze(&artifact("ckpt.PTH")).unwrap().framework, Framework::PyTorch);
    }

    #[test]
    fn test_name_hint_takes_priority_over_extension() {
        let descriptor = analyze(&artifact("tensorflow_export.onnx")).unwrap();
        assert_eq!(descriptor.framework, Framework::TensorFlow);
        assert_eq!(descriptor.base_image, "tensorflow/tensorflow:2.13.0-gpu");
        assert_eq!(
            descriptor.dependencies,
            vec!["tensorflow==2.13.0", "numpy==1.24.3", "flask==2.0.1"]
        );
    }

    #[test]
    fn test_onnx_dependencies() {
        let descriptor = analyze(&artifact("graph.onnx")).unwrap();
        assert_eq!(descriptor.base_image, "nvidia/cuda:11.8.0-runtime-ubuntu22.04");
        assert_eq!(
            descriptor.dependencies,
            vec!["onnxruntime-gpu==1.15.1", "numpy==1.24.3", "flask==2.0.1"]
        );
    }

    #[test]
    fn test_unsupported_extensions() {
        for name in ["weights.xyz", "model.safetensors", "archive.tar.gz", "README"] {
            match analyze(&artifact(name)) {
                Err(AnalyzeError::UnsupportedFormat(_)) => {}
                other => panic!("expected UnsupportedFormat for {name}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_oversized_files_rejected_for_every_extension() {
        for ext in SUPPORTED_EXTENSIONS {
            let artifact = ModelArtifact::new(format!("model.{ext}"), MAX_ARTIFACT_BYTES + 1);
            assert_eq!(
                analyze(&artifact),
                Err(AnalyzeError::FileTooLarge {
                    size: MAX_ARTIFACT_BYTES + 1
                })
            );
        }
    }

    #[test]
    fn test_exactly_ten_gib_is_accepted() {
        let artifact = ModelArtifact::new("model.pt", MAX_ARTIFACT_BYTES);
        assert!(analyze(&artifact).is_ok());
    }

    #[test]
    fn test_format_checked_before_size() {
        let artifact = ModelArtifact::new("model.xyz", MAX_ARTIFACT_BYTES * 2);
        assert_eq!(
            analyze(&artifact),
            Err(AnalyzeError::UnsupportedFormat("xyz".to_string()))
        );
    }

    #[test]
    fn test_pickle_without_hint_is_unknown() {
        assert_eq!(analyze(&artifact("model.pkl")), Err(AnalyzeError::UnknownFramework));
        assert_eq!(
            analyze(&artifact("pytorch_model.pkl")).unwrap().framework,
            Framework::PyTorch
        );
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let a = analyze(&artifact("resnet.pt")).unwrap();
        let b = analyze(&artifact("resnet.pt")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_file_too_large_message() {
        let err = AnalyzeError::FileTooLarge { size: 12 * GIB };
        assert_eq!(err.to_string(), "File size exceeds 10GB limit. Your file: 12.00GB");
    }
}
