use dirs_next as dirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Overrides [`Settings::menu_file`] when set.
pub const MENU_ENV: &str = "TRAINING_PAD_MENU";
/// Overrides [`Settings::history_file`] when set.
pub const HISTORY_ENV: &str = "TRAINING_PAD_HISTORY";

fn default_menu_file() -> PathBuf {
    PathBuf::from("menu.txt")
}

fn default_history_file() -> PathBuf {
    PathBuf::from("history_data.json")
}

fn default_true() -> bool {
    true
}

/// Persistent user preferences.
///
/// Relative paths are resolved against the working directory, matching how
/// the menu and history files are usually kept next to the program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_menu_file")]
    pub menu_file: PathBuf,
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    /// Write the bundled menu when `menu_file` does not exist.
    #[serde(default = "default_true")]
    pub seed_default_menu: bool,
    /// Exercise to select on startup.
    #[serde(default)]
    pub last_exercise: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            menu_file: default_menu_file(),
            history_file: default_history_file(),
            seed_default_menu: true,
            last_exercise: None,
        }
    }
}

impl Settings {
    const FILE: &'static str = "training_record_pad.json";

    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(Self::FILE))
    }

    /// Load settings from the JSON configuration file, falling back to
    /// defaults when it is missing or unreadable.
    pub fn load() -> Self {
        if let Some(path) = Self::path() {
            if let Ok(data) = std::fs::read_to_string(&path) {
                match serde_json::from_str(&data) {
                    Ok(cfg) => return cfg,
                    Err(e) => log::warn!("Ignoring settings in {}: {e}", path.display()),
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::path() {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match serde_json::to_string_pretty(self) {
                Ok(data) => {
                    if let Err(e) = std::fs::write(&path, data) {
                        log::error!("Failed to save settings to {}: {e}", path.display());
                    }
                }
                Err(e) => log::error!("Failed to serialize settings: {e}"),
            }
        }
    }

    /// Catalog location; the `TRAINING_PAD_MENU` environment variable takes
    /// precedence over the stored value.
    pub fn menu_path(&self) -> PathBuf {
        std::env::var_os(MENU_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.menu_file.clone())
    }

    /// History location; `TRAINING_PAD_HISTORY` takes precedence.
    pub fn history_path(&self) -> PathBuf {
        std::env::var_os(HISTORY_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.history_file.clone())
    }
}
