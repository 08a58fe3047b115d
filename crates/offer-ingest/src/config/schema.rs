use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::secrets::SecretSource;

pub const BIND_ENV_VAR: &str = "OFFER_INGEST_BIND";
pub const REDIS_URL_ENV_VAR: &str = "REDIS_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub rates: RatesConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub attachments: AttachmentsConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            extraction: ExtractionConfig::default(),
            rates: RatesConfig::default(),
            delivery: DeliveryConfig::default(),
            attachments: AttachmentsConfig::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl Config {
    /// Applies `OFFER_INGEST_BIND` and `REDIS_URL` on top of the file values.
    /// A `REDIS_URL` also switches the store backend to redis.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var(BIND_ENV_VAR) {
            if !bind.trim().is_empty() {
                self.server.bind = bind.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var(REDIS_URL_ENV_VAR) {
            if !url.trim().is_empty() {
                self.store.backend = StoreBackend::Redis;
                self.store.redis_url = Some(url.trim().to_string());
            }
        }
    }
}

// ── Server ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

// ── Store ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: None,
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl StoreConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ── Extraction oracle ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_openai_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_api_key_env_var() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_extraction_timeout() -> u64 {
    120
}

fn default_max_concurrent_sources() -> usize {
    4
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_base(),
            model: default_model(),
            temperature: default_temperature(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            timeout_secs: default_extraction_timeout(),
            max_concurrent_sources: default_max_concurrent_sources(),
        }
    }
}

impl ExtractionConfig {
    pub fn api_key_source(&self) -> SecretSource {
        SecretSource {
            value: self.api_key.clone(),
            file: self.api_key_file.clone(),
            env_var: self.api_key_env_var.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Rate oracle ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateProvider {
    #[default]
    Http,
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    #[serde(default)]
    pub provider: RateProvider,
    #[serde(default = "default_rates_base")]
    pub api_base: String,
    #[serde(default = "default_rates_timeout")]
    pub timeout_secs: u64,
    /// Units of EUR per one unit of the keyed currency.
    #[serde(default)]
    pub static_rates: BTreeMap<String, f64>,
}

fn default_rates_base() -> String {
    "https://api.frankfurter.app".to_string()
}

fn default_rates_timeout() -> u64 {
    10
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            provider: RateProvider::Http,
            api_base: default_rates_base(),
            timeout_secs: default_rates_timeout(),
            static_rates: BTreeMap::new(),
        }
    }
}

// ── Delivery ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default)]
    pub token_env_var: Option<String>,
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,
}

fn default_delivery_timeout() -> u64 {
    15
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            token: None,
            token_file: None,
            token_env_var: None,
            timeout_secs: default_delivery_timeout(),
        }
    }
}

impl DeliveryConfig {
    pub fn token_source(&self) -> SecretSource {
        SecretSource {
            value: self.token.clone(),
            file: self.token_file.clone(),
            env_var: self.token_env_var.clone(),
        }
    }
}

// ── Attachment download ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentsConfig {
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub auth_token_file: Option<String>,
    #[serde(default = "default_auth_token_env_var")]
    pub auth_token_env_var: Option<String>,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

fn default_download_timeout() -> u64 {
    60
}

fn default_auth_token_env_var() -> Option<String> {
    Some("D360_API_KEY".to_string())
}

fn default_max_bytes() -> u64 {
    25 * 1024 * 1024
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout(),
            auth_token: None,
            auth_token_file: None,
            auth_token_env_var: default_auth_token_env_var(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AttachmentsConfig {
    pub fn auth_token_source(&self) -> SecretSource {
        SecretSource {
            value: self.auth_token.clone(),
            file: self.auth_token_file.clone(),
            env_var: self.auth_token_env_var.clone(),
        }
    }
}

// ── Pipeline ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_processing_version")]
    pub processing_version: String,
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,
    #[serde(default = "default_true")]
    pub merge_text_context: bool,
}

fn default_processing_version() -> String {
    "1.0.0".to_string()
}

fn default_review_threshold() -> f64 {
    0.6
}

fn default_true() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            processing_version: default_processing_version(),
            review_threshold: default_review_threshold(),
            merge_text_context: true,
        }
    }
}
