use anyhow::{bail, Context, Result};
use shared::provider::ProviderClient;
use std::fmt;
use std::time::Duration;
use url::Url;

pub const API_KEY_ENV: &str = "GPULAB_API_KEY";

#[derive(Clone)]
pub struct DeployerConfig {
    pub provider_url: Url,
    api_key: String,
    pub author_url: String,
    pub request_timeout: Option<Duration>,
}

impl fmt::Debug for DeployerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployerConfig")
            .field("provider_url", &self.provider_url.as_str())
            .field("api_key", &"***")
            .field("author_url", &self.author_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl DeployerConfig {
    pub fn new(
        provider_url: &str,
        api_key: Option<String>,
        author_url: &str,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let provider_url = Url::parse(provider_url)
            .with_context(|| format!("Invalid provider URL: {provider_url}"))?;

        let api_key = match api_key.map(|key| key.trim().to_string()) {
            Some(key) if !key.is_empty() => key,
            _ => bail!("GPULab API key not configured (set {API_KEY_ENV})"),
        };

        let author = Url::parse(author_url)
            .with_context(|| format!("Invalid author URL: {author_url}"))?;
        if !matches!(author.scheme(), "http" | "https") {
            bail!("Author URL must use http or https: {author_url}");
        }

        Ok(Self {
            provider_url,
            api_key,
            author_url: author_url.to_string(),
            request_timeout,
        })
    }

    /// Reads the API key from the environment.
    pub fn from_env(
        provider_url: &str,
        author_url: &str,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        Self::new(
            provider_url,
            std::env::var(API_KEY_ENV).ok(),
            author_url,
            request_timeout,
        )
    }

    pub fn provider_client(&self) -> Result<ProviderClient> {
        ProviderClient::new(
            self.provider_url.as_str(),
            self.api_key.clone(),
            self.request_timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_rejected() {
        let err = DeployerConfig::new("https://api.gpulab.ai", None, "https://market.example", None)
            .unwrap_err();
        assert!(err.to_string().contains("GPULab API key not configured"));

        assert!(DeployerConfig::new(
            "https://api.gpulab.ai",
            Some("   ".to_string()),
            "https://market.example",
            None
        )
        .is_err());
    }

    #[test]
    fn test_author_url_must_be_http() {
        let result = DeployerConfig::new(
            "https://api.gpulab.ai",
            Some("key".to_string()),
            "ftp://market.example",
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = DeployerConfig::new(
            "https://api.gpulab.ai",
            Some("super-secret".to_string()),
            "https://market.example",
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(config.provider_client().is_ok());
    }
}
