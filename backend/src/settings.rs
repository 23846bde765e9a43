//! Application settings loaded via OrthoConfig.
//!
//! Values are layered from CLI flags, `RESTYLE_*` environment variables, and
//! an optional configuration file. Every key is optional; accessors apply the
//! documented defaults so the rest of the backend receives fully resolved
//! values and never reads the environment after startup.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{DEFAULT_MAX_IMAGE_BYTES, EditPipelineConfig, EditPrompt, ImageEditServiceConfig};
use crate::outbound::openai::{
    ApiKey, DEFAULT_BASE_URL, DEFAULT_IMAGE_SIZE, DEFAULT_MODEL, OpenAiProviderConfig,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 2_000;
const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

/// Errors raised while resolving loaded settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// `bind_addr` is not a socket address.
    #[error("invalid bind address {value:?}: {source}")]
    BindAddr {
        /// Raw configured value.
        value: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Configuration for the image edit backend.
#[derive(Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "RESTYLE")]
pub struct AppSettings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<String>,
    /// Provider bearer credential. Requests fail with a configuration error
    /// while this is unset.
    pub openai_api_key: Option<String>,
    /// Provider API root.
    pub openai_base_url: Option<String>,
    /// Provider image model.
    pub model: Option<String>,
    /// Output image size.
    pub image_size: Option<String>,
    /// Per-request provider timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Maximum provider attempts per edit.
    pub max_attempts: Option<u32>,
    /// First backoff delay in milliseconds.
    pub initial_backoff_ms: Option<u64>,
    /// Backoff ceiling in milliseconds.
    pub max_backoff_ms: Option<u64>,
    /// Probability in `[0, 1]` of treating a non-final attempt as overloaded.
    pub simulated_overload_rate: Option<f64>,
    /// Prompt applied when a submission carries none.
    pub default_prompt: Option<String>,
    /// Largest accepted source image in bytes.
    pub max_image_bytes: Option<usize>,
}

impl fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSettings")
            .field("bind_addr", &self.bind_addr)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("image_size", &self.image_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff_ms", &self.initial_backoff_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("simulated_overload_rate", &self.simulated_overload_rate)
            .field("default_prompt", &self.default_prompt)
            .field("max_image_bytes", &self.max_image_bytes)
            .finish()
    }
}

impl AppSettings {
    /// Resolve the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::BindAddr`] when the value does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.trim()
            .parse()
            .map_err(|source| SettingsError::BindAddr {
                value: raw.to_owned(),
                source,
            })
    }

    /// Provider credential, when one is configured and non-blank.
    pub fn api_key(&self) -> Option<ApiKey> {
        self.openai_api_key.as_deref().and_then(ApiKey::new)
    }

    /// Provider request shaping.
    pub fn provider_config(&self) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            base_url: non_blank(self.openai_base_url.as_deref())
                .unwrap_or(DEFAULT_BASE_URL)
                .to_owned(),
            model: non_blank(self.model.as_deref())
                .unwrap_or(DEFAULT_MODEL)
                .to_owned(),
            image_size: non_blank(self.image_size.as_deref())
                .unwrap_or(DEFAULT_IMAGE_SIZE)
                .to_owned(),
            timeout: Duration::from_secs(
                self.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                    .max(1),
            ),
        }
    }

    /// Retry policy; at least one attempt is always made and the ceiling is
    /// never below the first delay.
    pub fn pipeline_config(&self) -> EditPipelineConfig {
        let initial_backoff = Duration::from_millis(
            self.initial_backoff_ms
                .unwrap_or(DEFAULT_INITIAL_BACKOFF_MS),
        );
        let max_backoff = Duration::from_millis(self.max_backoff_ms.unwrap_or(DEFAULT_MAX_BACKOFF_MS))
            .max(initial_backoff);
        EditPipelineConfig {
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// Boundary defaults for the edit service. A blank configured prompt
    /// falls back to the built-in default.
    pub fn service_config(&self) -> ImageEditServiceConfig {
        let default_prompt = self
            .default_prompt
            .as_deref()
            .and_then(|raw| EditPrompt::new(raw).ok())
            .unwrap_or_default();
        ImageEditServiceConfig {
            default_prompt,
            max_image_bytes: self
                .max_image_bytes
                .filter(|limit| *limit > 0)
                .unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
        }
    }

    /// Overload simulation probability clamped to `[0, 1]`, or `None` when
    /// simulation is disabled.
    pub fn simulated_overload_rate(&self) -> Option<f64> {
        self.simulated_overload_rate
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .map(|rate| rate.min(1.0))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing and resolution.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const KEYS: [&str; 12] = [
        "RESTYLE_BIND_ADDR",
        "RESTYLE_OPENAI_API_KEY",
        "RESTYLE_OPENAI_BASE_URL",
        "RESTYLE_MODEL",
        "RESTYLE_IMAGE_SIZE",
        "RESTYLE_REQUEST_TIMEOUT_SECS",
        "RESTYLE_MAX_ATTEMPTS",
        "RESTYLE_INITIAL_BACKOFF_MS",
        "RESTYLE_MAX_BACKOFF_MS",
        "RESTYLE_SIMULATED_OVERLOAD_RATE",
        "RESTYLE_DEFAULT_PROMPT",
        "RESTYLE_MAX_IMAGE_BYTES",
    ];

    fn load_with(overrides: &[(&str, &str)]) -> AppSettings {
        let vars: Vec<(&str, Option<String>)> = KEYS
            .iter()
            .map(|key| {
                let value = overrides
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| (*value).to_owned());
                (*key, value)
            })
            .collect();
        let _guard = lock_env(vars);
        AppSettings::load_from_iter([OsString::from("restyle-backend")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_nothing_is_set() {
        let settings = load_with(&[]);

        assert_eq!(
            settings.bind_addr().expect("default bind addr"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("socket addr")
        );
        assert!(settings.api_key().is_none());
        let provider = settings.provider_config();
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.model, "gpt-image-1");
        assert_eq!(provider.image_size, "1024x1024");
        assert_eq!(provider.timeout, Duration::from_secs(120));
        assert_eq!(settings.pipeline_config(), EditPipelineConfig::default());
        let service = settings.service_config();
        assert_eq!(service.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert_eq!(service.default_prompt, EditPrompt::default());
        assert!(settings.simulated_overload_rate().is_none());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let settings = load_with(&[
            ("RESTYLE_BIND_ADDR", "127.0.0.1:9000"),
            ("RESTYLE_OPENAI_API_KEY", "sk-test"),
            ("RESTYLE_MODEL", "dall-e-2"),
            ("RESTYLE_MAX_ATTEMPTS", "5"),
            ("RESTYLE_INITIAL_BACKOFF_MS", "100"),
            ("RESTYLE_MAX_BACKOFF_MS", "400"),
            ("RESTYLE_SIMULATED_OVERLOAD_RATE", "0.25"),
            ("RESTYLE_DEFAULT_PROMPT", "Make it moody"),
            ("RESTYLE_MAX_IMAGE_BYTES", "2048"),
        ]);

        assert_eq!(
            settings.bind_addr().expect("bind addr"),
            "127.0.0.1:9000".parse::<SocketAddr>().expect("socket addr")
        );
        assert_eq!(
            settings.api_key().map(|key| key.expose().to_owned()),
            Some("sk-test".to_owned())
        );
        assert_eq!(settings.provider_config().model, "dall-e-2");
        assert_eq!(
            settings.pipeline_config(),
            EditPipelineConfig {
                max_attempts: 5,
                initial_backoff: Duration::from_millis(100),
                max_backoff: Duration::from_millis(400),
            }
        );
        assert_eq!(settings.simulated_overload_rate(), Some(0.25));
        let service = settings.service_config();
        assert_eq!(service.default_prompt.as_ref(), "Make it moody");
        assert_eq!(service.max_image_bytes, 2048);
    }

    #[rstest]
    fn degenerate_values_are_normalised() {
        let settings = load_with(&[
            ("RESTYLE_OPENAI_API_KEY", "   "),
            ("RESTYLE_MAX_ATTEMPTS", "0"),
            ("RESTYLE_INITIAL_BACKOFF_MS", "500"),
            ("RESTYLE_MAX_BACKOFF_MS", "10"),
            ("RESTYLE_SIMULATED_OVERLOAD_RATE", "7.5"),
            ("RESTYLE_DEFAULT_PROMPT", "  "),
        ]);

        assert!(settings.api_key().is_none());
        let pipeline = settings.pipeline_config();
        assert_eq!(pipeline.max_attempts, 1);
        assert_eq!(pipeline.max_backoff, Duration::from_millis(500));
        assert_eq!(settings.simulated_overload_rate(), Some(1.0));
        assert_eq!(settings.service_config().default_prompt, EditPrompt::default());
    }

    #[rstest]
    fn invalid_bind_addr_is_reported() {
        let settings = load_with(&[("RESTYLE_BIND_ADDR", "not-an-addr")]);
        let error = settings.bind_addr().expect_err("bind addr must fail");
        assert!(error.to_string().contains("not-an-addr"));
    }

    #[rstest]
    fn debug_output_redacts_the_credential() {
        let settings = load_with(&[("RESTYLE_OPENAI_API_KEY", "sk-do-not-print")]);
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("sk-do-not-print"));
        assert!(rendered.contains("[redacted]"));
    }
}
