//! Browser session scoped to a single article page.
//!
//! Uses chromiumoxide (CDP) with a realistic client identity so the catalog
//! site serves the full client-rendered article instead of a degraded bot
//! page. The session is a scoped resource: callers must `close()` it on
//! every exit path once the later stages are done with the live document.

use std::time::Duration;

use anyhow::Result;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SetupError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// How long to poll for an article signal after the document is ready.
const CONTENT_WAIT: Duration = Duration::from_secs(15);
const CONTENT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const COOKIE_BANNER_TIMEOUT: Duration = Duration::from_secs(3);

/// Browser session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSessionConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Initial navigation timeout in seconds.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

fn default_headless() -> bool {
    true
}

fn default_navigation_timeout() -> u64 {
    60
}

impl Default for BrowserSessionConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            navigation_timeout: default_navigation_timeout(),
            chrome_args: Vec::new(),
        }
    }
}

/// Scripts that patch away the most common automation markers.
const IDENTITY_SCRIPTS: &[&str] = &[
    // Remove webdriver property
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Fix chrome object
    r#"
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    // Fix languages
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
    // Fix plugins (make it look like regular Chrome)
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
];

/// Resolves once the document is interactive or complete, with a fallback
/// timer in case the event never fires.
const READY_STATE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// True once the page looks like a real article: a heading that is not the
/// generic site title, or a known section label in the body text.
const ARTICLE_SIGNAL_SCRIPT: &str = r#"
    (() => {
        const generic = /^wipo\s*green|wipogreen database$/i;
        for (const h of document.querySelectorAll('main h1, article h1, h1')) {
            const t = (h.textContent || '').trim();
            if (t && !generic.test(t)) return true;
        }
        const body = (document.body && document.body.innerText) || '';
        if (/\b(Description|Benefits|Additional Information)\b/.test(body)) return true;
        return /\bID\s*\d{3,}\b/.test(body);
    })()
"#;

const COOKIE_BANNER_SCRIPT: &str = r#"
    (() => {
        for (const btn of document.querySelectorAll('button, [role="button"]')) {
            const t = (btn.textContent || '').trim();
            if (/accept|agree|consent/i.test(t) && btn.offsetParent !== null) {
                btn.click();
                return true;
            }
        }
        return false;
    })()
"#;

/// One controllable browser session, scoped to one article URL.
pub struct ArticleSession {
    browser: Browser,
    page: Page,
    config: BrowserSessionConfig,
    handler_task: JoinHandle<()>,
}

impl ArticleSession {
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

    /// Find a Chrome executable.
    fn find_chrome() -> Result<std::path::PathBuf, SetupError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
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
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(SetupError(
            "Chrome/Chromium not found. Install it (e.g. apt install chromium-browser) \
             or download from https://www.google.com/chrome/"
                .to_string(),
        ))
    }

    /// Launch the browser and open a blank page with a realistic identity.
    pub async fn launch(config: &BrowserSessionConfig) -> Result<Self, SetupError> {
        let chrome_path = Self::find_chrome()?;

        info!("Launching browser (headless={})", config.headless);

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless, confusingly
        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--no-sandbox") // Often needed for headless in containers/restricted environments
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| SetupError(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SetupError(format!("Failed to launch browser: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SetupError(format!("Failed to open page: {}", e)))?;

        // Set the user agent before any navigation.
        if let Err(e) = page
            .execute(SetUserAgentOverrideParams::new(USER_AGENT.to_string()))
            .await
        {
            warn!("Could not override user agent: {}", e);
        }

        Ok(Self {
            browser,
            page,
            config: config.clone(),
            handler_task,
        })
    }

    /// The live page, for stages that run against the live document.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigate to the article and wait for a content-loaded state.
    ///
    /// The wait condition is document readiness plus an article signal
    /// (non-generic heading or known section label). If the signal does not
    /// appear within the window, the page is re-navigated exactly once and
    /// the pipeline proceeds with whatever state exists.
    pub async fn open_article(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.navigate(url).await?;

        if !self.wait_for_content().await {
            warn!("Content-loaded condition not met, reloading once");
            if let Err(e) = self.navigate(url).await {
                warn!("Reload navigation failed: {}", e);
            }
            if !self.wait_for_content().await {
                warn!("Proceeding with partially loaded page");
            }
        }

        self.dismiss_cookie_banner().await;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid URL: {}", e))?;

        let timeout = Duration::from_secs(self.config.navigation_timeout);
        match tokio::time::timeout(timeout, self.page.execute(params)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Navigation command failed: {}", e),
            Err(_) => warn!("Navigation timed out after {:?}", timeout),
        }

        // Wait for the document itself, then patch the client identity;
        // the scripts need a real page context to attach to.
        let ready: Option<String> = self
            .evaluate_with_timeout(READY_STATE_SCRIPT, timeout)
            .await;
        debug!("Page ready state: {}", ready.as_deref().unwrap_or("unknown"));

        for script in IDENTITY_SCRIPTS {
            if let Err(e) = self.page.evaluate(script.to_string()).await {
                debug!("Identity script skipped: {}", e);
            }
        }

        Ok(())
    }

    /// Poll for the article signal, bounded by [`CONTENT_WAIT`].
    async fn wait_for_content(&self) -> bool {
        let deadline = tokio::time::Instant::now() + CONTENT_WAIT;
        loop {
            let signal: Option<bool> = self
                .evaluate_with_timeout(ARTICLE_SIGNAL_SCRIPT, CONTENT_POLL_INTERVAL * 4)
                .await;
            if signal == Some(true) {
                debug!("Article content signal present");
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(CONTENT_POLL_INTERVAL).await;
        }
    }

    /// Accept a cookie banner if one is visible. Best-effort.
    async fn dismiss_cookie_banner(&self) {
        let clicked: Option<bool> = self
            .evaluate_with_timeout(COOKIE_BANNER_SCRIPT, COOKIE_BANNER_TIMEOUT)
            .await;
        if clicked == Some(true) {
            debug!("Dismissed cookie banner");
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
    }

    /// Run a script against the live document with a bounded wait; any
    /// failure or timeout is an empty result, never an error.
    pub async fn evaluate_with_timeout<T: DeserializeOwned>(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Option<T> {
        match tokio::time::timeout(timeout, self.page.evaluate(script.to_string())).await {
            Ok(Ok(result)) => result.into_value().ok(),
            Ok(Err(e)) => {
                debug!("Script evaluation failed: {}", e);
                None
            }
            Err(_) => {
                debug!("Script evaluation timed out after {:?}", timeout);
                None
            }
        }
    }

    /// Rendered HTML of the current document state.
    pub async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    /// The page's own URL after redirects, for resolving relative hrefs.
    pub async fn current_url(&self) -> Option<String> {
        match self.page.url().await {
            Ok(url) => url.map(|u| u.to_string()),
            Err(e) => {
                debug!("Could not read page URL: {}", e);
                None
            }
        }
    }

    /// Close the browser. Must run on every exit path.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        self.handler_task.abort();
    }
}
