//! Chromium-over-CDP implementation of the browser capability.
//!
//! Launches a local Chromium with anti-automation launch flags (or
//! attaches to a remote DevTools endpoint) and binds one page per
//! session. Stealth is layered on by the caller through
//! `install_on_new_document`.

#[cfg(feature = "browser")]
use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::{BrowserConfig, BrowserSession, SessionLauncher};
use crate::error::SessionError;
use crate::identity::Identity;

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig as LaunchConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

/// Chrome launch flags that reduce automation tells and keep headless
/// runs stable in containers.
#[cfg(feature = "browser")]
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--metrics-recording-only",
    "--safebrowsing-disable-auto-update",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-software-rasterizer",
];

/// Launches CDP sessions configured for an identity.
pub struct CdpLauncher {
    config: BrowserConfig,
}

impl CdpLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "browser")]
impl CdpLauncher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    fn find_chrome(&self) -> Result<std::path::PathBuf, SessionError> {
        if let Some(ref path) = self.config.chrome_path {
            return Ok(path.clone());
        }

        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("found Chrome at {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(SessionError::Launch(
            "Chrome/Chromium not found; install it or set browser.chrome_path".to_string(),
        ))
    }

    async fn launch_local(&self, identity: &Identity) -> Result<CdpSession, SessionError> {
        let chrome_path = self.find_chrome()?;

        info!("launching browser (headless={})", self.config.headless);

        let mut builder = LaunchConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless, confusingly.
        if !self.config.headless {
            builder = builder.with_head();
        }

        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in identity.fingerprint.chrome_args() {
            builder = builder.arg(arg);
        }
        if let Some(ref proxy) = identity.proxy {
            builder = builder.arg(proxy.chrome_arg());
        }
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let launch_config = builder
            .build()
            .map_err(|e| SessionError::Launch(format!("failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        CdpSession::bind(browser, handler_task, identity).await
    }

    /// Attach to an already-running Chrome over its DevTools endpoint.
    async fn attach_remote(&self, url: &str, identity: &Identity) -> Result<CdpSession, SessionError> {
        info!("connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let client = reqwest::Client::new();
        let resp: serde_json::Value = client
            .get(&version_url)
            .send()
            .await
            .map_err(|e| SessionError::Launch(format!("remote browser unreachable: {}", e)))?
            .json()
            .await
            .map_err(|e| SessionError::Launch(format!("bad version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SessionError::Launch("no webSocketDebuggerUrl in response".into()))?;

        debug!("connecting to WebSocket {}", ws_url);

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        CdpSession::bind(browser, handler_task, identity).await
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionLauncher for CdpLauncher {
    async fn launch(&self, identity: &Identity) -> Result<Box<dyn BrowserSession>, SessionError> {
        let session = match self.config.remote_url {
            Some(ref url) => self.attach_remote(url, identity).await?,
            None => self.launch_local(identity).await?,
        };
        Ok(Box::new(session))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionLauncher for CdpLauncher {
    async fn launch(&self, _identity: &Identity) -> Result<Box<dyn BrowserSession>, SessionError> {
        let _ = &self.config;
        Err(SessionError::Launch(
            "browser support not compiled; rebuild with --features browser".to_string(),
        ))
    }
}

/// One launched browser with a single bound page.
#[cfg(feature = "browser")]
pub struct CdpSession {
    browser: Arc<Mutex<Browser>>,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "browser")]
impl CdpSession {
    async fn bind(
        browser: Browser,
        handler_task: tokio::task::JoinHandle<()>,
        identity: &Identity,
    ) -> Result<Self, SessionError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        // User agent override must land before any navigation.
        page.execute(SetUserAgentOverrideParams::new(
            identity.fingerprint.user_agent.to_string(),
        ))
        .await
        .map_err(|e| SessionError::Protocol(e.to_string()))?;

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            page,
            handler_task,
        })
    }

    fn quoted(selector: &str) -> String {
        serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl BrowserSession for CdpSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| SessionError::Protocol(format!("invalid url: {}", e)))?;
        self.page
            .execute(params)
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, SessionError> {
        let result = self
            .page
            .evaluate(script.to_string())
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        Ok(url.map(|u| u.to_string()).unwrap_or_default())
    }

    async fn title(&self) -> Result<String, SessionError> {
        Ok(self
            .evaluate("document.title")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn content(&self) -> Result<String, SessionError> {
        self.page
            .content()
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))
    }

    async fn query_count(&self, selector: &str) -> Result<usize, SessionError> {
        let script = format!(
            "document.querySelectorAll({}).length",
            Self::quoted(selector)
        );
        Ok(self.evaluate(&script).await?.as_u64().unwrap_or(0) as usize)
    }

    async fn click(&self, selector: &str) -> Result<(), SessionError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn attribute(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute({}) : null; }})()",
            Self::quoted(selector),
            Self::quoted(name)
        );
        Ok(self
            .evaluate(&script)
            .await?
            .as_str()
            .map(|s| s.to_string()))
    }

    async fn install_on_new_document(&self, script: &str) -> Result<(), SessionError> {
        let params = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(script)
            .build()
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        self.page
            .execute(params)
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("browser close failed: {}", e);
        }
        self.handler_task.abort();
        Ok(())
    }
}
