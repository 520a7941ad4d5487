//! Configuration loaders for launch scenarios covering success and failure.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use pst_config::{Config, LogFormat, SocketEndpoint};
use tempfile::TempDir;

use crate::process::ConfigLoader;

/// Loader that places the control socket under a temporary directory.
#[derive(Clone)]
pub struct TestConfigLoader {
    socket_dir: Arc<TempDir>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory for socket");
        Self {
            socket_dir: Arc::new(dir),
        }
    }

    /// Endpoint the daemon will listen on.
    #[must_use]
    pub fn endpoint(&self) -> SocketEndpoint {
        let path = self.socket_dir.path().join("run").join("pst-lmc.sock");
        SocketEndpoint::unix(
            path.to_str()
                .expect("temporary socket path was not valid UTF-8"),
        )
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            control_socket: self.endpoint(),
            log_filter: String::from("warn"),
            log_format: LogFormat::Compact,
            application_name: String::from("pst-test"),
            shutdown_timeout_ms: 2_000,
        })
    }
}

/// Loader that fails by passing an unparsable endpoint flag.
#[derive(Clone, Copy)]
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("pst-lmcd"),
            OsString::from("--control-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
