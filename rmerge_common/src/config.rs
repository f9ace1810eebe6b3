use crate::{AppConfig, RMergeError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "rmerge.toml";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub exists: bool,
    pub portable: bool,
}

pub fn load_config(prefer_portable: bool) -> Result<LoadedConfig> {
    let (path, portable) = resolve_config_path(prefer_portable)?;
    load_config_from(&path, portable)
}

/// Load the config stored at `path`, falling back to defaults when it does not exist
pub fn load_config_from(path: &Path, portable: bool) -> Result<LoadedConfig> {
    let exists = path.exists();

    let mut config = if exists {
        let data = fs::read_to_string(path)?;
        toml::from_str(&data).map_err(|e| RMergeError::Serialization(e.to_string()))?
    } else {
        AppConfig::default()
    };

    config.portable_mode = portable;

    Ok(LoadedConfig {
        config,
        path: path.to_path_buf(),
        exists,
        portable,
    })
}

pub fn ensure_config(prefer_portable: bool) -> Result<LoadedConfig> {
    let loaded = load_config(prefer_portable)?;
    if !loaded.exists {
        save_config(&loaded.path, &loaded.config)?;
    }
    Ok(loaded)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = toml::to_string_pretty(config)
        .map_err(|e| RMergeError::Serialization(e.to_string()))?;
    fs::write(path, data)?;
    Ok(())
}

/// Directory merged output lands in when the caller names no output path:
/// the configured `output_dir`, else the config's own directory in portable
/// mode, else the working directory
pub fn default_output_dir(config: &AppConfig, portable: bool, config_path: &Path) -> PathBuf {
    if let Some(dir) = &config.output_dir {
        return dir.clone();
    }

    if portable {
        if let Some(parent) = config_path.parent() {
            return parent.to_path_buf();
        }
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn resolve_config_path(prefer_portable: bool) -> Result<(PathBuf, bool)> {
    if let Some(portable_path) = portable_config_path() {
        if prefer_portable || portable_path.exists() {
            return Ok((portable_path, true));
        }
    }

    let dirs = ProjectDirs::from("", "aecs4u", "rmerge")
        .ok_or_else(|| RMergeError::Config("Unable to determine config directory".to_string()))?;
    Ok((dirs.config_dir().join(CONFIG_FILE_NAME), false))
}

fn portable_config_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
}
