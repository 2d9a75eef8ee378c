//! Application configuration, loaded from YAML.

use std::path::PathBuf;

use action_flow::{EngineTimings, WatchdogConfig};
use cdp_adapter::CdpConfig;
use extensions_bridge::BridgeConfig;
use formflow_core_types::FormProfile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserSettings,
    pub engine: EngineTimings,
    pub watchdog: WatchdogSettings,
    pub relay: RelaySettings,
    pub profile: FormProfile,
    pub logging: LoggingSettings,
    /// Extra flow definition files added to the bundled catalog.
    pub flows: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    /// Attach to a running Chrome instead of launching one.
    pub websocket_url: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
    pub no_sandbox: bool,
    pub load_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            user_data_dir: None,
            websocket_url: None,
            window_width: 1280,
            window_height: 900,
            no_sandbox: false,
            load_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    #[serde(flatten)]
    pub polling: WatchdogConfig,
    pub save_attempts: u32,
    pub save_backoff_ms: u64,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        let bridge = BridgeConfig::default();
        Self {
            polling: WatchdogConfig::default(),
            save_attempts: bridge.save_attempts,
            save_backoff_ms: bridge.save_backoff_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Case API base; submissions are recorded manually without it.
    pub api_base_url: Option<String>,
    pub request_deadline_ms: u64,
    pub queue_depth: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        let bridge = BridgeConfig::default();
        Self {
            api_base_url: None,
            request_deadline_ms: bridge.request_deadline_ms,
            queue_depth: bridge.queue_depth,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Used when `--log-level` is not given.
    pub level: Option<String>,
}

impl Config {
    pub fn cdp_config(&self) -> CdpConfig {
        let defaults = CdpConfig::default();
        let browser = &self.browser;
        CdpConfig {
            executable: browser.executable.clone().unwrap_or(defaults.executable),
            user_data_dir: browser
                .user_data_dir
                .clone()
                .unwrap_or(defaults.user_data_dir),
            headless: browser.headless || defaults.headless,
            no_sandbox: browser.no_sandbox,
            window_size: Some((browser.window_width, browser.window_height)),
            load_timeout_ms: browser.load_timeout_ms,
            websocket_url: browser.websocket_url.clone(),
            ..defaults
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            request_deadline_ms: self.relay.request_deadline_ms,
            queue_depth: self.relay.queue_depth,
            api_base_url: self.relay.api_base_url.clone(),
            save_attempts: self.watchdog.save_attempts,
            save_backoff_ms: self.watchdog.save_backoff_ms,
        }
    }
}
