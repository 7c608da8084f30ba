use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the engine location.
pub const ENGINE_ENV: &str = "CUTLINE_FFMPEG";

/// Name looked up on the search path when nothing else is configured.
pub const DEFAULT_ENGINE: &str = "ffmpeg";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn with_ffmpeg_path(path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: Some(path.into()),
        }
    }

    /// Save the config as pretty-printed JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a config from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref()).map_err(CoreError::Io)?;
        let config: EngineConfig = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Resolve the engine executable once, up front.
    ///
    /// Order: explicit path, `CUTLINE_FFMPEG`, an `ffmpeg` next to the running
    /// binary, then the bare name for the OS to find on its search path.
    pub fn resolve(&self) -> PathBuf {
        let env_override = std::env::var_os(ENGINE_ENV).map(PathBuf::from);
        let beside_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(bundled_engine));
        resolve_with(self.ffmpeg_path.as_deref(), env_override, beside_exe)
    }
}

fn bundled_engine(dir: &Path) -> PathBuf {
    dir.join(format!("{DEFAULT_ENGINE}{}", std::env::consts::EXE_SUFFIX))
}

fn resolve_with(
    explicit: Option<&Path>,
    env_override: Option<PathBuf>,
    beside_exe: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return path.to_path_buf();
    }
    if let Some(path) = env_override.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }
    if let Some(path) = beside_exe.filter(|p| p.is_file()) {
        return path;
    }
    PathBuf::from(DEFAULT_ENGINE)
}
