//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `DOCMATCH_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_BUDGET_CAP, DEFAULT_CHECKPOINT_FILENAME, DEFAULT_CHECKPOINT_INTERVAL,
    DEFAULT_EXTRACT_WORKERS, DEFAULT_FACTS_CACHE_FILENAME, DEFAULT_MAX_IMAGE_DIM,
    DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_MAX_RETRIES, DEFAULT_MIN_CALL_DELAY_MS, DEFAULT_MODEL,
    DEFAULT_PAGE_TOLERANCE, DEFAULT_RENDER_DPI, DEFAULT_RENDER_FALLBACK_DPI, DEFAULT_RENDER_PAGES,
    DEFAULT_REPORT_FILENAME, DEFAULT_RETRY_BASE_MS, DEFAULT_SIMILARITY_THRESHOLD,
    DEFAULT_TEXT_PAGES, DEFAULT_VERIFY_WORKERS,
};
use crate::governor::Cost;
use crate::index::{CollectionSpec, CollectionTag, DEFAULT_INCLUDE_GLOB};
use crate::pipeline::PipelineConfig;
use crate::render::RenderConfig;
use crate::verify::{HttpBackendConfig, Pricing, RetryConfig};

/// Run configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `DOCMATCH_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Restricted collection root. Default: `./restricted`.
    pub restricted_dir: PathBuf,
    pub restricted_glob: String,
    pub restricted_prefix: Option<String>,

    /// Reference collection root. Default: `./reference`.
    pub reference_dir: PathBuf,
    pub reference_glob: String,
    pub reference_prefix: Option<String>,

    /// Checkpoint, facts cache and report live here. Default: `./.docmatch`.
    pub work_dir: PathBuf,

    pub page_tolerance: u32,
    pub similarity_threshold: f64,
    pub text_pages: u32,
    pub render_pages: u32,
    pub budget_cap: Cost,
    pub checkpoint_interval: usize,
    pub min_call_delay_ms: u64,
    pub verify_workers: usize,
    pub extract_workers: usize,

    pub render_dpi: u32,
    pub render_fallback_dpi: u32,
    pub max_image_dim: u32,
    pub max_payload_bytes: usize,

    pub max_retries: u32,
    pub retry_base_ms: u64,

    pub api_url: String,
    /// Verification service key. Log [`Config::redacted`], never the raw config.
    pub api_key: Option<String>,
    pub model: String,

    pub pricing: Pricing,

    /// Optional file replacing the built-in verification instruction.
    pub instruction_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            restricted_dir: PathBuf::from("./restricted"),
            restricted_glob: DEFAULT_INCLUDE_GLOB.to_string(),
            restricted_prefix: None,
            reference_dir: PathBuf::from("./reference"),
            reference_glob: DEFAULT_INCLUDE_GLOB.to_string(),
            reference_prefix: None,
            work_dir: PathBuf::from("./.docmatch"),
            page_tolerance: DEFAULT_PAGE_TOLERANCE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            text_pages: DEFAULT_TEXT_PAGES,
            render_pages: DEFAULT_RENDER_PAGES,
            budget_cap: Cost::from_amount(DEFAULT_BUDGET_CAP),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            min_call_delay_ms: DEFAULT_MIN_CALL_DELAY_MS,
            verify_workers: DEFAULT_VERIFY_WORKERS,
            extract_workers: DEFAULT_EXTRACT_WORKERS,
            render_dpi: DEFAULT_RENDER_DPI,
            render_fallback_dpi: DEFAULT_RENDER_FALLBACK_DPI,
            max_image_dim: DEFAULT_MAX_IMAGE_DIM,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            pricing: Pricing::default(),
            instruction_path: None,
        }
    }
}

impl Config {
    const ENV_RESTRICTED_DIR: &'static str = "DOCMATCH_RESTRICTED_DIR";
    const ENV_RESTRICTED_GLOB: &'static str = "DOCMATCH_RESTRICTED_GLOB";
    const ENV_RESTRICTED_PREFIX: &'static str = "DOCMATCH_RESTRICTED_PREFIX";
    const ENV_REFERENCE_DIR: &'static str = "DOCMATCH_REFERENCE_DIR";
    const ENV_REFERENCE_GLOB: &'static str = "DOCMATCH_REFERENCE_GLOB";
    const ENV_REFERENCE_PREFIX: &'static str = "DOCMATCH_REFERENCE_PREFIX";
    const ENV_WORK_DIR: &'static str = "DOCMATCH_WORK_DIR";
    const ENV_PAGE_TOLERANCE: &'static str = "DOCMATCH_PAGE_TOLERANCE";
    const ENV_SIMILARITY_THRESHOLD: &'static str = "DOCMATCH_SIMILARITY_THRESHOLD";
    const ENV_TEXT_PAGES: &'static str = "DOCMATCH_TEXT_PAGES";
    const ENV_RENDER_PAGES: &'static str = "DOCMATCH_RENDER_PAGES";
    const ENV_BUDGET_CAP: &'static str = "DOCMATCH_BUDGET_CAP";
    const ENV_CHECKPOINT_INTERVAL: &'static str = "DOCMATCH_CHECKPOINT_INTERVAL";
    const ENV_MIN_CALL_DELAY_MS: &'static str = "DOCMATCH_MIN_CALL_DELAY_MS";
    const ENV_VERIFY_WORKERS: &'static str = "DOCMATCH_VERIFY_WORKERS";
    const ENV_EXTRACT_WORKERS: &'static str = "DOCMATCH_EXTRACT_WORKERS";
    const ENV_RENDER_DPI: &'static str = "DOCMATCH_RENDER_DPI";
    const ENV_RENDER_FALLBACK_DPI: &'static str = "DOCMATCH_RENDER_FALLBACK_DPI";
    const ENV_MAX_IMAGE_DIM: &'static str = "DOCMATCH_MAX_IMAGE_DIM";
    const ENV_MAX_PAYLOAD_BYTES: &'static str = "DOCMATCH_MAX_PAYLOAD_BYTES";
    const ENV_MAX_RETRIES: &'static str = "DOCMATCH_MAX_RETRIES";
    const ENV_RETRY_BASE_MS: &'static str = "DOCMATCH_RETRY_BASE_MS";
    const ENV_API_URL: &'static str = "DOCMATCH_API_URL";
    const ENV_API_KEY: &'static str = "DOCMATCH_API_KEY";
    const ENV_MODEL: &'static str = "DOCMATCH_MODEL";
    const ENV_INPUT_PRICE: &'static str = "DOCMATCH_INPUT_PRICE";
    const ENV_OUTPUT_PRICE: &'static str = "DOCMATCH_OUTPUT_PRICE";
    const ENV_EXCHANGE_RATE: &'static str = "DOCMATCH_EXCHANGE_RATE";
    const ENV_INSTRUCTION_PATH: &'static str = "DOCMATCH_INSTRUCTION_PATH";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();

        Ok(Self {
            restricted_dir: Self::parse_path_from_env(Self::ENV_RESTRICTED_DIR, d.restricted_dir),
            restricted_glob: Self::parse_string_from_env(
                Self::ENV_RESTRICTED_GLOB,
                d.restricted_glob,
            ),
            restricted_prefix: Self::parse_optional_string_from_env(Self::ENV_RESTRICTED_PREFIX),
            reference_dir: Self::parse_path_from_env(Self::ENV_REFERENCE_DIR, d.reference_dir),
            reference_glob: Self::parse_string_from_env(Self::ENV_REFERENCE_GLOB, d.reference_glob),
            reference_prefix: Self::parse_optional_string_from_env(Self::ENV_REFERENCE_PREFIX),
            work_dir: Self::parse_path_from_env(Self::ENV_WORK_DIR, d.work_dir),
            page_tolerance: Self::parse_from_env(Self::ENV_PAGE_TOLERANCE, d.page_tolerance)?,
            similarity_threshold: Self::parse_from_env(
                Self::ENV_SIMILARITY_THRESHOLD,
                d.similarity_threshold,
            )?,
            text_pages: Self::parse_from_env(Self::ENV_TEXT_PAGES, d.text_pages)?,
            render_pages: Self::parse_from_env(Self::ENV_RENDER_PAGES, d.render_pages)?,
            budget_cap: Self::parse_from_env(Self::ENV_BUDGET_CAP, d.budget_cap)?,
            checkpoint_interval: Self::parse_from_env(
                Self::ENV_CHECKPOINT_INTERVAL,
                d.checkpoint_interval,
            )?,
            min_call_delay_ms: Self::parse_from_env(
                Self::ENV_MIN_CALL_DELAY_MS,
                d.min_call_delay_ms,
            )?,
            verify_workers: Self::parse_from_env(Self::ENV_VERIFY_WORKERS, d.verify_workers)?,
            extract_workers: Self::parse_from_env(Self::ENV_EXTRACT_WORKERS, d.extract_workers)?,
            render_dpi: Self::parse_from_env(Self::ENV_RENDER_DPI, d.render_dpi)?,
            render_fallback_dpi: Self::parse_from_env(
                Self::ENV_RENDER_FALLBACK_DPI,
                d.render_fallback_dpi,
            )?,
            max_image_dim: Self::parse_from_env(Self::ENV_MAX_IMAGE_DIM, d.max_image_dim)?,
            max_payload_bytes: Self::parse_from_env(
                Self::ENV_MAX_PAYLOAD_BYTES,
                d.max_payload_bytes,
            )?,
            max_retries: Self::parse_from_env(Self::ENV_MAX_RETRIES, d.max_retries)?,
            retry_base_ms: Self::parse_from_env(Self::ENV_RETRY_BASE_MS, d.retry_base_ms)?,
            api_url: Self::parse_string_from_env(Self::ENV_API_URL, d.api_url),
            api_key: Self::parse_optional_string_from_env(Self::ENV_API_KEY),
            model: Self::parse_string_from_env(Self::ENV_MODEL, d.model),
            pricing: Pricing {
                input_per_million: Self::parse_from_env(
                    Self::ENV_INPUT_PRICE,
                    d.pricing.input_per_million,
                )?,
                output_per_million: Self::parse_from_env(
                    Self::ENV_OUTPUT_PRICE,
                    d.pricing.output_per_million,
                )?,
                exchange_rate: Self::parse_from_env(
                    Self::ENV_EXCHANGE_RATE,
                    d.pricing.exchange_rate,
                )?,
            },
            instruction_path: Self::parse_optional_path_from_env(Self::ENV_INSTRUCTION_PATH),
        })
    }

    /// Validates paths and ranges (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        for dir in [&self.restricted_dir, &self.reference_dir] {
            if !dir.exists() {
                return Err(ConfigError::PathNotFound { path: dir.clone() });
            }
            if !dir.is_dir() {
                return Err(ConfigError::NotADirectory { path: dir.clone() });
            }
        }

        if self.work_dir.exists() && !self.work_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.work_dir.clone(),
            });
        }

        if let Some(ref path) = self.instruction_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_SIMILARITY_THRESHOLD,
                reason: format!("{} is not within [0, 1]", self.similarity_threshold),
            });
        }

        let positive: [(&'static str, u64); 8] = [
            (Self::ENV_TEXT_PAGES, self.text_pages.into()),
            (Self::ENV_RENDER_PAGES, self.render_pages.into()),
            (Self::ENV_CHECKPOINT_INTERVAL, self.checkpoint_interval as u64),
            (Self::ENV_VERIFY_WORKERS, self.verify_workers as u64),
            (Self::ENV_EXTRACT_WORKERS, self.extract_workers as u64),
            (Self::ENV_RENDER_DPI, self.render_dpi.into()),
            (Self::ENV_MAX_IMAGE_DIM, self.max_image_dim.into()),
            (Self::ENV_MAX_PAYLOAD_BYTES, self.max_payload_bytes as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::OutOfRange {
                    name,
                    reason: "must be greater than 0".to_string(),
                });
            }
        }

        if self.render_fallback_dpi == 0 || self.render_fallback_dpi > self.render_dpi {
            return Err(ConfigError::OutOfRange {
                name: Self::ENV_RENDER_FALLBACK_DPI,
                reason: format!(
                    "{} must be between 1 and the primary resolution {}",
                    self.render_fallback_dpi, self.render_dpi
                ),
            });
        }

        let prices = [
            (Self::ENV_INPUT_PRICE, self.pricing.input_per_million),
            (Self::ENV_OUTPUT_PRICE, self.pricing.output_per_million),
            (Self::ENV_EXCHANGE_RATE, self.pricing.exchange_rate),
        ];
        for (name, value) in prices {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfRange {
                    name,
                    reason: format!("{value} must be a non-negative number"),
                });
            }
        }

        Ok(())
    }

    /// API key, required before any verification call is made.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar {
                name: Self::ENV_API_KEY,
            })
    }

    /// Copy safe to log.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "***".to_string()),
            ..self.clone()
        }
    }

    pub fn restricted_spec(&self) -> CollectionSpec {
        Self::collection_spec(
            CollectionTag::Restricted,
            &self.restricted_dir,
            &self.restricted_glob,
            self.restricted_prefix.as_deref(),
        )
    }

    pub fn reference_spec(&self) -> CollectionSpec {
        Self::collection_spec(
            CollectionTag::Reference,
            &self.reference_dir,
            &self.reference_glob,
            self.reference_prefix.as_deref(),
        )
    }

    fn collection_spec(
        tag: CollectionTag,
        root: &std::path::Path,
        glob: &str,
        prefix: Option<&str>,
    ) -> CollectionSpec {
        let spec = CollectionSpec::new(tag, root).include_glob(glob);
        match prefix {
            Some(prefix) => spec.prefix(prefix),
            None => spec,
        }
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.work_dir.join(DEFAULT_CHECKPOINT_FILENAME)
    }

    pub fn facts_cache_path(&self) -> PathBuf {
        self.work_dir.join(DEFAULT_FACTS_CACHE_FILENAME)
    }

    pub fn report_path(&self) -> PathBuf {
        self.work_dir.join(DEFAULT_REPORT_FILENAME)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            page_tolerance: self.page_tolerance,
            similarity_threshold: self.similarity_threshold,
            text_pages: self.text_pages,
            checkpoint_interval: self.checkpoint_interval,
            verify_workers: self.verify_workers,
            extract_workers: self.extract_workers,
            budget_cap: self.budget_cap,
            min_call_delay: Duration::from_millis(self.min_call_delay_ms),
        }
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            pages: self.render_pages,
            dpi: self.render_dpi,
            fallback_dpi: self.render_fallback_dpi,
            max_dim: self.max_image_dim,
            max_payload_bytes: self.max_payload_bytes,
            ..RenderConfig::default()
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .with_max_retries(self.max_retries)
            .with_base_delay(Duration::from_millis(self.retry_base_ms))
    }

    pub fn backend_config(&self) -> Result<HttpBackendConfig, ConfigError> {
        Ok(HttpBackendConfig {
            url: self.api_url.clone(),
            api_key: self.require_api_key()?.to_string(),
            model: self.model.clone(),
            ..HttpBackendConfig::default()
        })
    }

    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match env::var(var_name) {
            Ok(value) if !value.trim().is_empty() => {
                value
                    .trim()
                    .parse()
                    .map_err(|e: T::Err| ConfigError::InvalidValue {
                        name: var_name,
                        value: value.clone(),
                        reason: e.to_string(),
                    })
            }
            _ => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        Self::parse_optional_string_from_env(var_name).map(PathBuf::from)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }
}
