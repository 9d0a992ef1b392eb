use std::path::Path;

use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod mapping;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use mapping::ColumnMapping;
pub use settings::{
    CategorySettings, EtlSettings, ForecastTarget, Hyperparameters, KpiSettings, LogSettings,
    ModelSettings, Settings, SourceSettings, Sources,
};

/// Prefix for environment overrides, e.g. `CIVITAS__KPIS__RESOLUTION_TARGET_PCT=90`.
const ENV_PREFIX: &str = "CIVITAS";

/// Loads the application configuration from the `config.toml` file in the working
/// directory, falling back to defaults when the file does not exist.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(Path::new("config.toml"))
}

/// Loads the application configuration from `path`.
///
/// Layers, lowest precedence first: built-in defaults, the TOML file (optional),
/// `CIVITAS__*` environment variables. The merged result is validated before it is
/// returned.
pub fn load_config_from(path: &Path) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Settings` struct
    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;

    tracing::debug!(path = %path.display(), sources = settings.sources.0.len(), "configuration loaded");
    Ok(settings)
}
