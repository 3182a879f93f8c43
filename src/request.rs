use std::sync::Arc;

use anyhow::anyhow;
use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::util::Wait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tokio::task::spawn_blocking;

use crate::{info_time, Error, Result, Target};

/// Starts a fresh, isolated browser for every attempt.
pub trait PageLauncher: Send + Sync + 'static {
    type Page: Page;

    fn launch(&self) -> Result<Self::Page>;
}

/// A single browser session. Dropping it must shut the browser down.
pub trait Page {
    /// Navigates to `url` and waits for the load to finish.
    fn load(&self, url: &str) -> Result<()>;
    /// Clicks the first element matching `selector`.
    fn expand(&self, selector: &str) -> Result<()>;
    /// Waits until at least one element matching `selector` is visible.
    fn wait_for_rows(&self, selector: &str) -> Result<()>;
    /// The rendered document.
    fn html(&self) -> Result<String>;
}

/// Loads the target page with a freshly launched browser and returns its rendered HTML.
/// The browser is gone by the time this returns, whether the attempt succeeded or not.
pub(crate) async fn request_page_html<L: PageLauncher>(launcher: Arc<L>, target: Arc<Target>) -> Result<String> {
    let html = spawn_blocking(move || render_page(&*launcher, &target)).await??;
    Ok(html)
}

fn render_page<L: PageLauncher>(launcher: &L, target: &Target) -> Result<String> {
    let page = launcher.launch()?;

    page.load(&target.url)?;
    info_time!("Page loaded");

    page.expand(&target.expand_selector)?;
    info_time!("Clicked on summary element");

    std::thread::sleep(target.settle_delay);
    info_time!("Waiting for table data to load");

    page.wait_for_rows(&target.wait_selector)?;
    info_time!("Table rows found and visible");

    page.html()
}

/// Headless Chrome, driven over the DevTools protocol.
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher;

pub struct ChromePage {
    // Field order matters: the tab has to go before the browser process it lives in.
    tab: Arc<Tab>,
    _browser: Browser,
}

impl PageLauncher for ChromeLauncher {
    type Page = ChromePage;

    fn launch(&self) -> Result<ChromePage> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            // Cron jobs tend to run as root, where Chrome refuses to start sandboxed.
            .sandbox(false)
            .build()
            .map_err(|e| anyhow!("invalid launch options: {e}"))?;
        let browser = Browser::new(options)?;
        let tab = browser.new_tab()?;

        // Every request is let through untouched; this is where filtering would go.
        tab.enable_fetch(None, None)?;
        tab.enable_request_interception(pass_through())?;

        Ok(ChromePage { tab, _browser: browser })
    }
}

fn pass_through() -> Arc<dyn RequestInterceptor + Send + Sync> {
    Arc::new(
        |_transport: Arc<Transport>, _session_id: SessionId, _event: RequestPausedEvent| {
            RequestPausedDecision::Continue(None)
        },
    )
}

fn expand_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({selector:?}); if (!el) return false; el.click(); return true; }})()"
    )
}

impl Page for ChromePage {
    fn load(&self, url: &str) -> Result<()> {
        self.tab.navigate_to(url)?.wait_until_navigated()?;
        Ok(())
    }

    fn expand(&self, selector: &str) -> Result<()> {
        // `evaluate` drops script exceptions, so the script reports whether it found something to click.
        let clicked = self
            .tab
            .evaluate(&expand_script(selector), false)?
            .value
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if !clicked {
            return Err(anyhow!("nothing to click for selector {selector}").into());
        }
        Ok(())
    }

    fn wait_for_rows(&self, selector: &str) -> Result<()> {
        self.tab.wait_for_element(selector)?;
        // Present isn't enough, the row also needs a layout box.
        Wait::default()
            .until(|| {
                self.tab
                    .find_element(selector)
                    .ok()
                    .filter(|row| row.get_box_model().is_ok())
                    .map(|_| ())
            })
            .map_err(|_| Error::RowsNotVisible(selector.into()))
    }

    fn html(&self) -> Result<String> {
        Ok(self.tab.get_content()?)
    }
}
