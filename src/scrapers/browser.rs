use crate::config::ResolverConfig;
use crate::scrapers::traits::SearchSession;
use crate::scrapers::types::RenderedLink;
use anyhow::{anyhow, Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use reqwest::Url;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const CLEAR_INPUT_JS: &str = r#"
function() {
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
}
"#;

/// Region search page driven through headless Chrome
pub struct ChromeSession {
    // Dropping the browser kills the Chrome process
    _browser: Browser,
    tab: Arc<Tab>,
    cfg: ResolverConfig,
    result_selector: Selector,
    base_url: Url,
}

impl ChromeSession {
    /// Launch Chrome, open the marketplace and bring up the location search dialog
    pub fn launch(cfg: &ResolverConfig) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(cfg.headless)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        let result_selector = Selector::parse(&cfg.result_selector)
            .map_err(|e| anyhow!("Invalid result selector {:?}: {:?}", cfg.result_selector, e))?;
        let base_url = Url::parse(&cfg.start_url).context("Invalid start URL")?;

        info!("Opening {}...", cfg.start_url);
        let tab = browser.new_tab()?;
        tab.navigate_to(&cfg.start_url)?;
        tab.wait_until_navigated()?;
        thread::sleep(Duration::from_secs(2));

        tab.wait_for_element(&cfg.location_button)
            .context("Location button not found")?
            .click()?;
        thread::sleep(Duration::from_secs(1));

        Ok(Self {
            _browser: browser,
            tab,
            cfg: cfg.clone(),
            result_selector,
            base_url,
        })
    }

    fn clear(&self) -> Result<()> {
        let input = self
            .tab
            .wait_for_element(&self.cfg.input_selector)
            .context("Search input not found")?;
        input.call_js_fn(CLEAR_INPUT_JS, vec![], false)?;
        Ok(())
    }
}

impl SearchSession for ChromeSession {
    fn submit_query(&mut self, query: &str) -> Result<()> {
        self.clear()?;

        self.tab.wait_for_element(&self.cfg.input_selector)?.click()?;
        self.tab.type_str(query)?;
        thread::sleep(Duration::from_millis(self.cfg.type_delay_ms));

        self.tab
            .wait_for_element(&self.cfg.submit_selector)
            .context("Search button not found")?
            .click()?;
        debug!("Submitted region query {query}");
        Ok(())
    }

    fn rendered_links(&mut self) -> Result<Vec<RenderedLink>> {
        let html_result = self.tab.evaluate("document.documentElement.outerHTML", false)?;
        let html = match html_result.value {
            Some(value) => value.as_str().unwrap_or("").to_string(),
            None => {
                warn!("Could not get HTML from page");
                String::new()
            }
        };

        Ok(parse_result_links(&html, &self.result_selector, &self.base_url))
    }

    fn clear_input(&mut self) -> Result<()> {
        self.clear()
    }
}

/// Extract result anchors from page HTML.
///
/// Text is whitespace-collapsed; relative hrefs are resolved against `base`.
pub fn parse_result_links(html: &str, selector: &Selector, base: &Url) -> Vec<RenderedLink> {
    let document = Html::parse_document(html);

    document
        .select(selector)
        .map(|anchor| {
            // Inline children (highlighted terms) join without a separator
            let raw_text = anchor.text().collect::<String>();
            let text = raw_text.split_whitespace().collect::<Vec<_>>().join(" ");
            let raw_href = anchor.value().attr("href").unwrap_or("");
            let href = base
                .join(raw_href)
                .map(String::from)
                .unwrap_or_else(|_| raw_href.to_string());
            RenderedLink { text, href }
        })
        .collect()
}
