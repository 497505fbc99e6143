use std::path::PathBuf;

/// Resolve the autoblast home directory.
///
/// Priority:
/// 1) AUTOBLAST_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.autoblast
pub fn autoblast_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("AUTOBLAST_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".autoblast");
    }
    PathBuf::from(".").join(".autoblast")
}

/// Default logs directory: ~/.autoblast/logs
pub fn default_logs_dir() -> PathBuf {
    autoblast_home().join("logs")
}

/// Default config file: ~/.autoblast/config.toml
pub fn default_config_path() -> PathBuf {
    autoblast_home().join("config.toml")
}
