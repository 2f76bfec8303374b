use super::{ModelCatalog, ResourceProvider};
use crate::models::container::{ContainerRequest, ContainerStatus, DeployedContainer};
use crate::models::gpu::GpuOffer;
use crate::models::model::{CreatedModel, DeployedModelView, ModelRequest};
use crate::models::volume::{CreatedVolume, VolumeRequest, VolumeUpdate, VolumeView};
use crate::models::wire::is_truthy;
use crate::models::{ConnectionHealth, ProviderResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PROVIDER_URL: &str = "https://api.gpulab.ai";

const API_KEY_HEADER: &str = "api-key";

/// How the provider expects the key on a given route. The management routes
/// take an `api-key` header while the versioned `/v1` routes take a bearer token.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Auth {
    ApiKeyHeader,
    Bearer,
}

/// Management routes answer with `{ "success": ..., ...fields }`; versioned
/// routes may answer with the bare payload.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Flagged,
    Raw,
}

#[derive(Deserialize)]
struct HealthBody {
    version: Option<String>,
}

#[derive(Serialize)]
struct ContainerAddress<'a> {
    address: &'a str,
}

#[derive(Clone)]
pub struct ProviderClient {
    base_url: Url,
    api_key: String,
    client: reqwest::Client,
}

impl fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"***")
            .finish()
    }
}

impl ProviderClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid provider URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Provider URL cannot be used as a base: {base_url}");
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base is rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str], auth: Auth) -> Result<RequestBuilder, String> {
        let url = self.endpoint(segments);
        debug!("Making request to: {method} {url}");
        let builder = self.client.request(method, url);
        let builder = match auth {
            Auth::ApiKeyHeader => {
                let value = HeaderValue::from_str(&self.api_key)
                    .map_err(|_| "API key contains invalid header characters".to_string())?;
                builder.header(API_KEY_HEADER, value)
            }
            Auth::Bearer => {
                let value = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                    .map_err(|_| "API key contains invalid header characters".to_string())?;
                builder.header(AUTHORIZATION, value)
            }
        };
        Ok(builder)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: Result<RequestBuilder, String>,
        shape: Shape,
    ) -> ProviderResult<T> {
        let outcome = match request {
            Ok(request) => send(request, shape).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(data) => ProviderResult::ok(data),
            Err(e) => {
                error!("Provider call {operation} failed: {e}");
                ProviderResult::err(e)
            }
        }
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder, shape: Shape) -> Result<T, String> {
    let response = request
        .send()
        .await
        .map_err(|e| format!("Request failed: {e}"))?;
    let status = response.status();
    debug!("Response status: {status}");

    let body = response
        .text()
        .await
        .map_err(|e| format!("Failed to read response body: {e}"))?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| error_message(&value));
        return Err(message.unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16())));
    }

    decode_body(&body, shape)
}

fn decode_body<T: DeserializeOwned>(body: &str, shape: Shape) -> Result<T, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("Malformed response body: {e}"))?;

    let payload = match (shape, value.get("success")) {
        (_, Some(flag)) if !is_truthy(flag) => {
            return Err(error_message(&value)
                .unwrap_or_else(|| "Provider reported an unsuccessful response".to_string()));
        }
        (Shape::Flagged, None) => {
            return Err("Provider response is missing the success flag".to_string());
        }
        (Shape::Flagged, Some(_)) => value,
        (Shape::Raw, Some(_)) => value.get("data").cloned().unwrap_or(Value::Null),
        (Shape::Raw, None) => value,
    };

    serde_json::from_value(payload).map_err(|e| format!("Unexpected response shape: {e}"))
}

fn error_message(value: &Value) -> Option<String> {
    ["message", "error", "details"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl ModelCatalog for ProviderClient {
    async fn list_models(&self) -> ProviderResult<Vec<DeployedModelView>> {
        let request = self.request(Method::GET, &["v1", "models"], Auth::Bearer);
        self.execute("list_models", request, Shape::Raw).await
    }
}

#[async_trait]
impl ResourceProvider for ProviderClient {
    async fn create_model(&self, model: &ModelRequest) -> ProviderResult<CreatedModel> {
        let request = self
            .request(Method::POST, &["model-upload"], Auth::ApiKeyHeader)
            .map(|r| r.json(model));
        self.execute("create_model", request, Shape::Flagged).await
    }

    async fn delete_model(&self, identifier: &str) -> ProviderResult<Value> {
        let request = self.request(Method::DELETE, &["models", identifier], Auth::ApiKeyHeader);
        self.execute("delete_model", request, Shape::Flagged).await
    }

    async fn list_volumes(&self) -> ProviderResult<Vec<VolumeView>> {
        let request = self.request(Method::GET, &["nas-servers"], Auth::ApiKeyHeader);
        self.execute("list_volumes", request, Shape::Raw).await
    }

    async fn create_volume(&self, volume: &VolumeRequest) -> ProviderResult<CreatedVolume> {
        let request = self
            .request(Method::POST, &["nas-server"], Auth::ApiKeyHeader)
            .map(|r| r.json(volume));
        self.execute("create_volume", request, Shape::Flagged).await
    }

    async fn update_volume(&self, update: &VolumeUpdate) -> ProviderResult<Value> {
        let request = self
            .request(Method::PUT, &["nas-server"], Auth::ApiKeyHeader)
            .map(|r| r.json(update));
        self.execute("update_volume", request, Shape::Flagged).await
    }

    async fn delete_volume(&self, identifier: &str) -> ProviderResult<Value> {
        let request = self.request(
            Method::DELETE,
            &["nas-server", identifier],
            Auth::ApiKeyHeader,
        );
        self.execute("delete_volume", request, Shape::Flagged).await
    }

    async fn deploy_container(
        &self,
        container: &ContainerRequest,
    ) -> ProviderResult<DeployedContainer> {
        let request = self
            .request(Method::POST, &["container", "deploy"], Auth::ApiKeyHeader)
            .map(|r| r.json(container));
        self.execute("deploy_container", request, Shape::Flagged).await
    }

    async fn container_status(&self, container_id: &str) -> ProviderResult<ContainerStatus> {
        let request = self
            .request(Method::GET, &["containerstats"], Auth::ApiKeyHeader)
            .map(|r| r.query(&[("container_id", container_id)]));
        self.execute("container_status", request, Shape::Flagged).await
    }

    async fn delete_container(&self, address: &str) -> ProviderResult<Value> {
        let request = self
            .request(Method::DELETE, &["container"], Auth::ApiKeyHeader)
            .map(|r| r.json(&ContainerAddress { address }));
        self.execute("delete_container", request, Shape::Flagged).await
    }

    async fn list_gpus(&self) -> ProviderResult<Vec<GpuOffer>> {
        let request = self.request(Method::GET, &["gpus"], Auth::ApiKeyHeader);
        let gpus: ProviderResult<Vec<GpuOffer>> =
            self.execute("list_gpus", request, Shape::Raw).await;
        match gpus.into_result("Failed to fetch GPUs") {
            Ok(gpus) => ProviderResult::ok(gpus.into_iter().filter(|gpu| gpu.available).collect()),
            Err(e) => ProviderResult::err(e),
        }
    }

    async fn check_connection(&self) -> ProviderResult<ConnectionHealth> {
        let request = self.request(Method::GET, &["v1", "health"], Auth::Bearer);
        let health: ProviderResult<HealthBody> =
            self.execute("check_connection", request, Shape::Raw).await;
        match health.into_result("Failed to connect to GPULab") {
            Ok(body) => ProviderResult::ok(ConnectionHealth {
                status: "connected".to_string(),
                api_version: body.version.unwrap_or_else(|| "v1".to_string()),
                server_time: chrono::Utc::now().to_rfc3339(),
            }),
            Err(e) => ProviderResult::err(e),
        }
    }
}
