use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Environment variable overriding the application root directory.
const HOME_ENV: &str = "TALKMATE_HOME";

pub struct PortablePathManager;

impl PortablePathManager {
    /// Application root: `TALKMATE_HOME` if set, otherwise the directory holding the executable.
    pub fn root_dir() -> PathBuf {
        if let Ok(home) = env::var(HOME_ENV) {
            if !home.trim().is_empty() {
                return PathBuf::from(home);
            }
        }

        let exe_dir = match env::current_exe() {
            Ok(mut path) => {
                path.pop();
                path
            }
            Err(e) => {
                warn!("Failed to get current exe path: {}. Falling back to current_dir.", e);
                return env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            }
        };

        #[cfg(debug_assertions)]
        {
            // target/debug/<exe> -> workspace root, where apps/core holds the data files
            let mut workspace = exe_dir.clone();
            workspace.pop();
            workspace.pop();
            let core_path = workspace.join("apps").join("core");
            if core_path.exists() {
                return core_path;
            }
        }

        exe_dir
    }

    /// Static tables: lexicon and resource JSON files (./resources).
    pub fn resources_dir() -> PathBuf {
        Self::root_dir().join("resources")
    }

    /// Character cards (./character).
    pub fn character_dir() -> PathBuf {
        Self::root_dir().join("character")
    }

    /// Writable data root (./data).
    pub fn data_dir() -> PathBuf {
        Self::root_dir().join("data")
    }

    /// Turn logs (./data/memory).
    pub fn memory_dir() -> PathBuf {
        Self::data_dir().join("memory")
    }

    /// Creates the writable directories if they don't exist.
    pub fn init() -> Result<(), std::io::Error> {
        for dir in [Self::data_dir(), Self::memory_dir()] {
            if !dir.exists() {
                info!("Creating directory: {:?}", dir);
                fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}
