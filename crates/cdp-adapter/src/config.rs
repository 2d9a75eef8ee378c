use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CHROME_ENV: &str = "FORMFLOW_CHROME";
pub const PROFILE_ENV: &str = "FORMFLOW_CHROME_PROFILE";
pub const HEADLESS_ENV: &str = "FORMFLOW_HEADLESS";

/// How the browser is launched or reached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Chrome binary; empty lets the launcher search for one.
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub no_sandbox: bool,
    /// Initial window size in CSS pixels.
    pub window_size: Option<(u32, u32)>,
    /// Per-command response deadline.
    pub default_deadline_ms: u64,
    /// How long a navigation may take to reach `readyState == "complete"`.
    pub load_timeout_ms: u64,
    /// Attach to an already running browser instead of launching one.
    pub websocket_url: Option<String>,
    /// 0 disables the keep-alive ping.
    pub heartbeat_interval_ms: u64,
}

impl Default for CdpConfig {
    fn default() -> Self {
        let user_data_dir = env::var(PROFILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".formflow-profile"));
        let headless = env::var(HEADLESS_ENV)
            .map(|value| !matches!(value.trim(), "0" | "false" | "no"))
            .unwrap_or(false);
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir,
            headless,
            no_sandbox: false,
            window_size: None,
            default_deadline_ms: 30_000,
            load_timeout_ms: 30_000,
            websocket_url: None,
            heartbeat_interval_ms: 15_000,
        }
    }
}

/// `FORMFLOW_CHROME`, then well-known binary names on `PATH`, then the
/// usual install locations.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(path) = env::var(CHROME_ENV) {
        let candidate = PathBuf::from(path.trim());
        if candidate.exists() {
            return Some(candidate);
        }
        debug!(path = %candidate.display(), "FORMFLOW_CHROME points at a missing file");
    }

    let names = [
        "google-chrome-stable",
        "google-chrome",
        "chromium",
        "chromium-browser",
        "chrome",
        "msedge",
    ];
    if let Some(found) = names.iter().find_map(|name| which::which(name).ok()) {
        return Some(found);
    }

    install_locations()
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}

#[cfg(target_os = "macos")]
fn install_locations() -> &'static [&'static str] {
    &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ]
}

#[cfg(target_os = "windows")]
fn install_locations() -> &'static [&'static str] {
    &[
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn install_locations() -> &'static [&'static str] {
    &[
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ]
}
