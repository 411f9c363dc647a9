//! Configuration layering: CLI args and env vars (handled by `clap` itself)
//! win over a local `./picprog.toml`, which wins over the user's global
//! config file (`directories::ProjectDirs`), which wins over built-in
//! defaults. Grounded on `hisiflash-cli/src/config.rs`'s identical
//! priority order.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The CDC-ACM link speed is virtual, but a concrete default keeps
/// `--baud` optional for the common case.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Values that may be supplied by a config file instead of on the command
/// line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default serial port path, e.g. `/dev/ttyACM0` or `COM5`.
    pub port: Option<String>,
    /// Default baud rate.
    pub baud: Option<u32>,
}

impl Config {
    /// Load the local config file if present, falling back to the user's
    /// global config file, falling back to defaults.
    #[must_use]
    pub fn load() -> Self {
        if let Some(local) = Self::read(&PathBuf::from("picprog.toml")) {
            return local;
        }
        if let Some(dirs) = directories::ProjectDirs::from("", "", "picprog") {
            let global = dirs.config_dir().join("config.toml");
            if let Some(config) = Self::read(&global) {
                return config;
            }
        }
        Self::default()
    }

    fn read(path: &PathBuf) -> Option<Self> {
        let text = fs::read_to_string(path).ok()?;
        match toml::from_str(&text) {
            Ok(config) => Some(config),
            Err(err) => {
                log::warn!("ignoring malformed config file {}: {err}", path.display());
                None
            }
        }
    }

    /// Resolve the port to use: CLI flag, then this config, with no
    /// further fallback — the caller reports an error if both are absent.
    #[must_use]
    pub fn resolve_port(&self, cli_port: Option<String>) -> Option<String> {
        cli_port.or_else(|| self.port.clone())
    }

    /// Resolve the baud rate to use: CLI flag, then this config, then
    /// [`DEFAULT_BAUD`].
    #[must_use]
    pub fn resolve_baud(&self, cli_baud: Option<u32>) -> u32 {
        cli_baud.or(self.baud).unwrap_or(DEFAULT_BAUD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_port_prefers_cli_over_config() {
        let config = Config {
            port: Some("/dev/ttyACM0".into()),
            baud: None,
        };
        assert_eq!(
            config.resolve_port(Some("/dev/ttyUSB0".into())),
            Some("/dev/ttyUSB0".into())
        );
        assert_eq!(config.resolve_port(None), Some("/dev/ttyACM0".into()));
    }

    #[test]
    fn resolve_baud_falls_back_to_default() {
        let config = Config::default();
        assert_eq!(config.resolve_baud(None), DEFAULT_BAUD);
        assert_eq!(config.resolve_baud(Some(9600)), 9600);
    }
}
