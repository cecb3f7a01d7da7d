//! Shared startup for the `kfsearch` binaries.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use kfsearch_core::config::{Config, ModelSpec, Settings};

/// Install the global subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let config = Config::load().context("loading configuration")?;
    tracing::debug!(env = config.env_name(), "configuration loaded");
    Ok(config.settings()?)
}

/// The `ModelSpec` configured for `model`, or an error naming the configured ids.
pub fn model_spec<'s>(settings: &'s Settings, model: &str) -> anyhow::Result<&'s ModelSpec> {
    settings.models.get(model).with_context(|| {
        format!(
            "model '{}' is not configured, configured models are: [{}]",
            model,
            settings.models.keys().cloned().collect::<Vec<_>>().join(", ")
        )
    })
}
