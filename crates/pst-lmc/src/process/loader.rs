//! Configuration loading seam.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use pst_config::Config;

/// Abstracts configuration loading so launch can be driven from tests.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the layered loader's error when a source cannot be read or
    /// parsed.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that reads defaults, the configuration file, the environment, and
/// the process arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that always yields the same, already resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps a resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use pst_config::SocketEndpoint;

    use super::*;

    #[test]
    fn static_loader_returns_its_configuration_every_time() {
        let config = Config {
            control_socket: SocketEndpoint::tcp("127.0.0.1", 0),
            application_name: String::from("pst-static"),
            ..Config::default()
        };
        let loader = StaticConfigLoader::new(config.clone());
        assert_eq!(loader.load().expect("first load"), config);
        assert_eq!(loader.load().expect("second load"), config);
    }
}
