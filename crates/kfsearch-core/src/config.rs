//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! The typed [`Settings`] tree is extracted and validated once at startup;
//! everything downstream works with validated values only.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_TOP_K: usize = 100;
pub const DEFAULT_K_RRF: f64 = 60.0;
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_IMAGE_SIZE: usize = 224;

pub struct Config {
    figment: Figment,
    env_name: String,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let base_dir = env::current_dir()?;
        let config = Self { figment, env_name, base_dir };
        config.validate_for_env()?;
        Ok(config)
    }

    /// Build a config from an inline TOML document, resolving relative paths
    /// against `base_dir`.
    pub fn from_toml_str(toml: &str, env_name: &str, base_dir: &Path) -> Result<Self> {
        let config = Self {
            figment: Figment::new().merge(Toml::string(toml)),
            env_name: env_name.to_string(),
            base_dir: base_dir.to_path_buf(),
        };
        config.validate_for_env()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// Typed, validated settings with every path expanded and resolved.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        settings.resolve_paths(&self.base_dir);
        Ok(settings)
    }

    fn validate_for_env(&self) -> Result<()> {
        match self.env_name.as_str() {
            "prod" | "production" => {
                let models: BTreeMap<String, ModelSpec> = self.get("models").unwrap_or_default();
                if models.is_empty() {
                    return Err(Error::InvalidConfig(
                        "production config must declare at least one [models.<id>] table".into(),
                    ));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub models: BTreeMap<String, ModelSpec>,
    #[serde(default)]
    pub annotations: AnnotationSettings,
    #[serde(default)]
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_k_rrf")]
    pub k_rrf: f64,
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_top_k: DEFAULT_TOP_K,
            k_rrf: DEFAULT_K_RRF,
            source_timeout_ms: DEFAULT_SOURCE_TIMEOUT_MS,
        }
    }
}

/// One embedding model and the index files built with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(default)]
    pub backbone: Option<String>,
    #[serde(default)]
    pub pretrained: Option<String>,
    pub vector_path: PathBuf,
    pub mapping_path: PathBuf,
    pub dimension: usize,
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    #[serde(default = "default_image_size")]
    pub image_size: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationSettings {
    /// Tantivy index over captions, OCR text and detected objects.
    #[serde(default)]
    pub text_index_dir: Option<PathBuf>,
    /// JSON annotation file backing the object-filter catalog.
    #[serde(default)]
    pub detections_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathSettings {
    /// Prefix stripped from paths in search responses.
    #[serde(default)]
    pub database_dir: Option<PathBuf>,
    #[serde(default)]
    pub keyframes_dir: Option<PathBuf>,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_k_rrf() -> f64 {
    DEFAULT_K_RRF
}

fn default_source_timeout_ms() -> u64 {
    DEFAULT_SOURCE_TIMEOUT_MS
}

fn default_image_size() -> usize {
    DEFAULT_IMAGE_SIZE
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.search.default_top_k == 0 {
            return Err(Error::InvalidConfig("search.default_top_k must be > 0".into()));
        }
        if !self.search.k_rrf.is_finite() || self.search.k_rrf < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "search.k_rrf must be a finite number >= 0, got {}",
                self.search.k_rrf
            )));
        }
        if self.search.source_timeout_ms == 0 {
            return Err(Error::InvalidConfig("search.source_timeout_ms must be > 0".into()));
        }
        for (id, spec) in &self.models {
            if !is_valid_model_id(id) {
                return Err(Error::InvalidConfig(format!(
                    "model id '{}' must match [a-z0-9_-]+",
                    id
                )));
            }
            if spec.dimension == 0 {
                return Err(Error::InvalidConfig(format!("models.{}.dimension must be > 0", id)));
            }
            if spec.image_size == 0 {
                return Err(Error::InvalidConfig(format!("models.{}.image_size must be > 0", id)));
            }
            if spec.vector_path.as_os_str().is_empty() || spec.mapping_path.as_os_str().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "models.{} needs both vector_path and mapping_path",
                    id
                )));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            let resolved = resolve_with_base(base, p.to_string_lossy());
            *p = resolved;
        };
        for spec in self.models.values_mut() {
            resolve(&mut spec.vector_path);
            resolve(&mut spec.mapping_path);
            if let Some(dir) = spec.model_dir.as_mut() {
                resolve(dir);
            }
        }
        for p in [
            self.annotations.text_index_dir.as_mut(),
            self.annotations.detections_path.as_mut(),
            self.paths.database_dir.as_mut(),
            self.paths.keyframes_dir.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            resolve(p);
        }
    }
}

pub fn is_valid_model_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
