use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use harvest_core::classify::PageSnapshot;
use harvest_core::error::HarvestError;
use harvest_core::proxy::ProxyEndpoint;
use harvest_core::traits::PageDriver;
use tokio::sync::Mutex;

/// Headless-Chromium page driver speaking the Chrome DevTools Protocol.
///
/// Chromium only takes a proxy at launch (`--proxy-server`), so the
/// driver keeps one browser process per active proxy and relaunches when
/// the engine rotates to a different endpoint. Each `navigate` call
/// opens a fresh tab, waits for `<body>`, captures the final URL, title,
/// and rendered HTML, and closes the tab.
pub struct ChromiumDriver {
    timeout: Duration,
    /// (proxy authority, live browser) for the currently active proxy.
    current: Mutex<Option<(String, Arc<Browser>)>>,
}

impl ChromiumDriver {
    /// 30 s navigation timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            current: Mutex::new(None),
        }
    }

    /// Get the browser bound to `proxy`, launching (and dropping any
    /// previous browser) when the proxy changed since the last call.
    async fn browser_for(&self, proxy: &ProxyEndpoint) -> Result<Arc<Browser>, HarvestError> {
        let authority = proxy.authority();
        let mut current = self.current.lock().await;

        if let Some((active, browser)) = current.as_ref()
            && *active == authority
        {
            return Ok(Arc::clone(browser));
        }

        if current.take().is_some() {
            tracing::info!(proxy = %authority, "Proxy changed, relaunching browser");
        }

        let browser = launch(&authority).await?;
        let browser = Arc::new(browser);
        *current = Some((authority, Arc::clone(&browser)));
        Ok(browser)
    }
}

impl Default for ChromiumDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PageDriver for ChromiumDriver {
    async fn navigate(
        &self,
        url: &str,
        proxy: &ProxyEndpoint,
    ) -> Result<PageSnapshot, HarvestError> {
        let browser = self.browser_for(proxy).await?;
        let timeout = self.timeout;

        let result = tokio::time::timeout(timeout, async {
            let page = browser.new_page(url).await.map_err(|e| {
                HarvestError::NetworkError(format!("failed to navigate to {url}: {e}"))
            })?;

            // <body> present is the minimal signal that the page rendered.
            page.find_element("body").await.map_err(|e| {
                HarvestError::NetworkError(format!("page did not render body: {e}"))
            })?;

            let final_url = page
                .url()
                .await
                .map_err(|e| HarvestError::BrowserError(format!("failed to read url: {e}")))?
                .unwrap_or_else(|| url.to_string());

            let title = page
                .get_title()
                .await
                .map_err(|e| HarvestError::BrowserError(format!("failed to read title: {e}")))?
                .unwrap_or_default();

            let html = page
                .content()
                .await
                .map_err(|e| HarvestError::BrowserError(format!("failed to read content: {e}")))?;

            // Close the tab to free browser resources.
            let _ = page.close().await;

            Ok::<PageSnapshot, HarvestError>(PageSnapshot {
                requested_url: url.to_string(),
                final_url,
                title,
                html,
            })
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(HarvestError::Timeout(timeout.as_secs())),
        }
    }
}

/// Launch headless Chromium routed through the given proxy.
async fn launch(proxy_authority: &str) -> Result<Browser, HarvestError> {
    let mut builder = BrowserConfig::builder();
    builder = builder.no_sandbox().disable_default_args();

    if let Some(bin) = find_chrome_binary() {
        tracing::info!("Using Chrome binary: {}", bin.display());
        builder = builder.chrome_executable(bin);
    }

    let config = builder
        .arg("--headless=new")
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-popup-blocking")
        .arg("--no-first-run")
        .arg(format!("--proxy-server={proxy_authority}"))
        .build()
        .map_err(|e| HarvestError::BrowserError(format!("browser config error: {e}")))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| HarvestError::BrowserError(format!("failed to launch browser: {e}")))?;

    // The CDP handler must be polled continuously for the connection to work.
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                tracing::warn!("Browser CDP handler error: {event:?}");
                break;
            }
        }
    });

    Ok(browser)
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// On systems where Chromium is installed via snap, the wrapper at
/// `/snap/bin/chromium` strips unknown CLI flags, breaking headless
/// mode. We look for the real binary inside the snap first, then fall
/// back to well-known system paths. If nothing is found we return
/// `None` and let `chromiumoxide` do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    let candidates: &[&str] = &[
        // Snap (Ubuntu default)
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        // Flatpak
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        // Common apt / manual installs
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}
