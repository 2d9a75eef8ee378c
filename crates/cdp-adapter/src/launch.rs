//! Starting Chromium and finding its DevTools endpoint.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::StreamExt;
use serde_json::json;
use tracing::info;

use crate::config::{CdpConfig, CHROME_ENV};
use crate::error::{AdapterError, AdapterErrorKind};

const ENDPOINT_WAIT: Duration = Duration::from_secs(20);

const CHROME_FLAGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-breakpad",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-hang-monitor",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-sync",
    "--password-store=basic",
    "--use-mock-keychain",
    "--remote-allow-origins=*",
];

const HEADLESS_FLAGS: &[&str] = &["--headless=new", "--hide-scrollbars", "--mute-audio"];

/// A reachable browser: the websocket to talk to and, when we started it,
/// the process to stop afterwards.
pub(crate) struct Endpoint {
    pub ws_url: String,
    pub process: Option<Child>,
}

/// Attach to `websocket_url` when configured, else launch a new Chromium.
pub(crate) async fn endpoint(cfg: &CdpConfig) -> Result<Endpoint, AdapterError> {
    if let Some(ws_url) = &cfg.websocket_url {
        return Ok(Endpoint {
            ws_url: ws_url.clone(),
            process: None,
        });
    }

    let mut process = browser_config(cfg)?.launch().map_err(|err| {
        AdapterError::new(AdapterErrorKind::LaunchFailed)
            .with_hint(format!("failed to launch chromium: {err}"))
    })?;
    let ws_url = read_ws_url(&mut process)
        .await
        .map_err(|err| AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint(err.to_string()))?;
    info!(target: "cdp-launch", executable = %cfg.executable.display(), headless = cfg.headless, "chromium launched");

    Ok(Endpoint {
        ws_url,
        process: Some(process),
    })
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let has_executable = !cfg.executable.as_os_str().is_empty();
    if has_executable && !cfg.executable.exists() {
        return Err(AdapterError::new(AdapterErrorKind::LaunchFailed)
            .with_hint(format!(
                "chrome executable not found at {}",
                cfg.executable.display()
            ))
            .with_data(json!({
                "expected": cfg.executable,
                "hint": format!("Set {CHROME_ENV} to the full path of chrome/chromium."),
            })));
    }

    let profile_dir = profile_dir(cfg)?;
    std::fs::create_dir_all(&profile_dir).map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal).with_hint(format!(
            "cannot create user-data-dir {}: {err}",
            profile_dir.display()
        ))
    })?;

    let mut args: Vec<&str> = CHROME_FLAGS.to_vec();
    if cfg.headless {
        args.extend_from_slice(HEADLESS_FLAGS);
    }

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(ENDPOINT_WAIT)
        .user_data_dir(profile_dir)
        .args(args);
    if !cfg.headless {
        builder = builder.with_head();
    }
    if cfg.no_sandbox {
        builder = builder.no_sandbox();
    }
    if let Some((width, height)) = cfg.window_size {
        builder = builder.window_size(width, height);
    }
    if has_executable {
        builder = builder.chrome_executable(cfg.executable.clone());
    }

    builder.build().map_err(|err| {
        AdapterError::new(AdapterErrorKind::LaunchFailed)
            .with_hint(format!("browser config error: {err}"))
    })
}

/// Relative profile directories are anchored at the working directory so
/// that repeated runs reuse the same login state.
fn profile_dir(cfg: &CdpConfig) -> Result<PathBuf, AdapterError> {
    if cfg.user_data_dir.is_absolute() {
        return Ok(cfg.user_data_dir.clone());
    }
    let cwd = std::env::current_dir().map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("cannot resolve working directory: {err}"))
    })?;
    Ok(cwd.join(&cfg.user_data_dir))
}

/// Chromium prints `DevTools listening on ws://…` on stderr at startup.
async fn read_ws_url(process: &mut Child) -> anyhow::Result<String> {
    let stderr = process
        .stderr
        .take()
        .ok_or_else(|| anyhow!("chromium process missing stderr handle"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut seen = Vec::new();

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = line?;
            if let Some(ws_url) = ws_url_in(&line) {
                return Ok(ws_url);
            }
            if seen.len() < 8 {
                seen.push(line);
            }
        }
        Err(anyhow!(
            "chromium exited before printing its devtools address: {}",
            seen.join(" | ")
        ))
    };

    tokio::time::timeout(ENDPOINT_WAIT, scan)
        .await
        .map_err(|_| anyhow!("timed out waiting for the chromium devtools address"))?
}

fn ws_url_in(line: &str) -> Option<String> {
    let (_, rest) = line.rsplit_once("listening on ")?;
    let rest = rest.trim();
    (rest.starts_with("ws") && rest.contains("devtools/browser")).then(|| rest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_browser_endpoint() {
        assert_eq!(
            ws_url_in("DevTools listening on ws://127.0.0.1:41723/devtools/browser/5b1c"),
            Some("ws://127.0.0.1:41723/devtools/browser/5b1c".to_string())
        );
        assert_eq!(ws_url_in("[0101/000000.1:ERROR:gpu_init.cc] skipped"), None);
        assert_eq!(
            ws_url_in("listening on ws://127.0.0.1:9222/devtools/page/AB"),
            None
        );
    }

    #[test]
    fn missing_executable_fails_before_launch() {
        let cfg = CdpConfig {
            executable: PathBuf::from("/nonexistent/formflow/chrome"),
            ..CdpConfig::default()
        };
        let err = browser_config(&cfg).err().unwrap();
        assert_eq!(err.kind, AdapterErrorKind::LaunchFailed);
        assert!(err.data.is_some());
    }

    #[tokio::test]
    async fn websocket_url_skips_the_launch() {
        let cfg = CdpConfig {
            websocket_url: Some("ws://127.0.0.1:9222/devtools/browser/x".into()),
            executable: PathBuf::from("/nonexistent/formflow/chrome"),
            ..CdpConfig::default()
        };
        let endpoint = endpoint(&cfg).await.unwrap();
        assert!(endpoint.process.is_none());
        assert_eq!(endpoint.ws_url, "ws://127.0.0.1:9222/devtools/browser/x");
    }
}
