//! HTTP and WebSocket front end for deckscore.

pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

use std::path::PathBuf;

pub use error::{ApiError, ApiResult, StartupError};
pub use routes::router;
pub use state::AppState;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "DECKSCORE_CONFIG";

/// Config file location: `$DECKSCORE_CONFIG`, else `~/.deckscore/deckscore.json`.
pub fn config_path() -> PathBuf {
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".deckscore")
            .join("deckscore.json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_path_from_env() {
        std::env::set_var(CONFIG_ENV_VAR, "/etc/deckscore/custom.json");
        assert_eq!(config_path(), PathBuf::from("/etc/deckscore/custom.json"));
        std::env::remove_var(CONFIG_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_blank_env_falls_back_to_home() {
        std::env::set_var(CONFIG_ENV_VAR, "  ");
        let path = config_path();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert!(path.ends_with(".deckscore/deckscore.json"));
    }
}
