//! Environment variable source: INFINITE_HD__* with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// `INFINITE_HD__CHUNK_SIZE=65536`, `INFINITE_HD__LOGGING__LEVEL=debug`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix("INFINITE_HD")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
