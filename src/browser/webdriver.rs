use super::{Anchor, AnchorScope, ElementLocator, Heading, PageContext, SessionFactory};
use crate::config::FixerConfig;
use crate::error::{Error, Result};
use crate::parsers::html;
use crate::utils::without_fragment;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::time::Duration;
use std::future::Future;
use tokio::time::{Instant, sleep, timeout_at};
use url::Url;

/// How often the URL is polled after a click
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time given to a same-page fragment link to scroll
const FRAGMENT_GRACE: Duration = Duration::from_millis(500);

/// Opens a WebDriver session per job
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    webdriver_url: String,
    headless: bool,
    page_load_timeout: Duration,
    settle_delay: Duration,
}

impl WebDriverFactory {
    pub fn new(config: &FixerConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            headless: config.headless,
            page_load_timeout: config.page_load_timeout(),
            settle_delay: config.settle_delay(),
        }
    }

    /// Chrome options for an unattended session
    fn capabilities(&self) -> Map<String, Value> {
        let mut args = vec![
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--window-size=1920,1080",
        ];
        if self.headless {
            args.insert(0, "--headless");
        }

        let mut caps = Map::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        caps
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    type Context = WebDriverContext;

    async fn open(&self, worker_id: usize) -> Result<Self::Context> {
        let client = connect_to_webdriver(worker_id, &self.webdriver_url, self.capabilities()).await?;
        Ok(WebDriverContext {
            client: Some(client),
            worker_id,
            page_load_timeout: self.page_load_timeout,
            settle_delay: self.settle_delay,
            runtime: tokio::runtime::Handle::current(),
        })
    }
}

/// Connects to the WebDriver instance, trying common local endpoints when
/// the configured one refuses
async fn connect_to_webdriver(
    worker_id: usize,
    webdriver_url: &str,
    capabilities: Map<String, Value>,
) -> Result<Client> {
    let mut builder = ClientBuilder::native();
    builder.capabilities(capabilities);

    let first_error = match builder.connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!(
                "Worker {} connected to WebDriver at {}",
                worker_id,
                webdriver_url
            );
            return Ok(client);
        }
        Err(e) => {
            ::log::error!(
                "Worker {} failed to connect to WebDriver at {}: {}",
                worker_id,
                webdriver_url,
                e
            );
            e
        }
    };

    let fallback_urls = ["http://localhost:9515", "http://127.0.0.1:4444"];
    for url in fallback_urls.iter().filter(|url| **url != webdriver_url) {
        ::log::info!(
            "Worker {} trying fallback WebDriver URL: {}",
            worker_id,
            url
        );
        if let Ok(client) = builder.connect(url).await {
            ::log::debug!(
                "Worker {} connected to fallback WebDriver at {}",
                worker_id,
                url
            );
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(first_error.into())
}

/// A live browser session driven over WebDriver.
///
/// The session is closed by [`PageContext::close`]. If the context is dropped
/// without being closed, for example while a panic unwinds, the close is
/// scheduled on the runtime instead.
pub struct WebDriverContext {
    client: Option<Client>,
    worker_id: usize,
    page_load_timeout: Duration,
    settle_delay: Duration,
    runtime: tokio::runtime::Handle,
}

impl WebDriverContext {
    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Navigation("session already closed".to_string()))
    }

    /// Wait for `document.readyState == "complete"` until `deadline`, then
    /// let client-side rendering settle
    async fn wait_for_page_load(&self, deadline: Instant) -> bool {
        let Ok(client) = self.client() else {
            return false;
        };

        let worker_id = self.worker_id;
        let ready = poll_until_ready(deadline, move || async move {
            match client.execute("return document.readyState", vec![]).await {
                Ok(Value::String(state)) => Some(state == "complete"),
                Ok(_) => Some(false),
                Err(e) => {
                    ::log::debug!("Worker {} readyState check failed: {}", worker_id, e);
                    None
                }
            }
        })
        .await;

        if ready {
            sleep(self.settle_delay).await;
        }
        ready
    }

    /// Current page source, empty if it cannot be read
    async fn source(&self) -> String {
        let Ok(client) = self.client() else {
            return String::new();
        };
        match client.source().await {
            Ok(source) => source,
            Err(e) => {
                handle_navigation_error(&e, "getting source", self.worker_id);
                String::new()
            }
        }
    }

    async fn locate(&self, locator: &ElementLocator) -> Result<Element> {
        let client = self.client()?;
        match locator {
            ElementLocator::Position { scope, index } => client
                .find_all(Locator::Css(scope.selector()))
                .await?
                .into_iter()
                .nth(*index)
                .ok_or_else(|| Error::Navigation(format!("no element at {scope:?}[{index}]"))),
            ElementLocator::ExactText(text) => Ok(client.find(Locator::LinkText(text)).await?),
            ElementLocator::PartialText(text) => {
                for element in client.find_all(Locator::Css("a")).await? {
                    if element.text().await.is_ok_and(|t| t.contains(text.as_str())) {
                        return Ok(element);
                    }
                }
                Err(Error::Navigation(format!("no link containing '{text}'")))
            }
        }
    }
}

/// Polls `check` until it reports ready, fails, or `deadline` passes.
/// `check` yields `Some(ready)`, or `None` when it cannot tell.
async fn poll_until_ready<F, Fut>(deadline: Instant, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<bool>>,
{
    let polling = async {
        loop {
            match check().await {
                Some(true) => return true,
                Some(false) => {}
                None => return false,
            }
            sleep(POLL_INTERVAL).await;
        }
    };
    timeout_at(deadline, polling).await.unwrap_or(false)
}

/// Logs a WebDriver error, calling out lost sessions
fn handle_navigation_error(error: &fantoccini::error::CmdError, context: &str, worker_id: usize) {
    if error.to_string().contains("Unable to find session") {
        ::log::warn!("Worker {} lost session while {}", worker_id, context);
    } else {
        ::log::error!("Worker {} failed {}: {}", worker_id, context, error);
    }
}

fn is_same_page_fragment(href: Option<&str>, current: &Url) -> bool {
    let Some(href) = href.filter(|h| h.contains('#')) else {
        return false;
    };
    Url::parse(href)
        .map(|target| without_fragment(&target) == without_fragment(current))
        .unwrap_or(false)
}

#[async_trait]
impl PageContext for WebDriverContext {
    async fn navigate(&mut self, url: &str) -> bool {
        let Ok(client) = self.client() else {
            return false;
        };
        // goto and the readyState wait share one page-load budget
        let deadline = Instant::now() + self.page_load_timeout;
        match timeout_at(deadline, client.goto(url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                handle_navigation_error(&e, &format!("loading {url}"), self.worker_id);
                return false;
            }
            Err(_) => {
                ::log::warn!("Worker {} timed out loading {}", self.worker_id, url);
                return false;
            }
        }
        self.wait_for_page_load(deadline).await
    }

    async fn current_url(&mut self) -> Option<Url> {
        self.client().ok()?.current_url().await.ok()
    }

    async fn list_anchors(&mut self, scope: AnchorScope) -> Vec<Anchor> {
        let page_url = self.current_url().await;
        let source = self.source().await;
        html::parse_anchors(&source, page_url.as_ref(), scope)
    }

    async fn find_headings(&mut self) -> Vec<Heading> {
        html::parse_headings(&self.source().await)
    }

    async fn find_by_exact_text(&mut self, text: &str) -> Option<Anchor> {
        let element = self.client().ok()?.find(Locator::LinkText(text)).await.ok()?;
        let href = element.prop("href").await.ok().flatten();
        let text_shown = element.text().await.unwrap_or_else(|_| text.to_string());
        Some(Anchor {
            href,
            text: text_shown.trim().to_string(),
            locator: ElementLocator::ExactText(text.to_string()),
        })
    }

    async fn find_by_partial_text(&mut self, text: &str) -> Option<Anchor> {
        let page_url = self.current_url().await;
        let source = self.source().await;
        html::find_link_by_text(&source, page_url.as_ref(), text, true)
    }

    async fn has_id(&mut self, id: &str) -> bool {
        match self.client() {
            Ok(client) => client.find(Locator::Id(id)).await.is_ok(),
            Err(_) => false,
        }
    }

    async fn click_and_observe(&mut self, anchor: &Anchor, max_wait: Duration) -> Result<Url> {
        let original = self.client()?.current_url().await?;
        let element = self.locate(&anchor.locator).await?;

        if is_same_page_fragment(anchor.href.as_deref(), &original) {
            element.click().await?;
            sleep(FRAGMENT_GRACE).await;
            return Ok(self.client()?.current_url().await?);
        }

        element.click().await?;

        let deadline = Instant::now() + max_wait;
        loop {
            let current = self.client()?.current_url().await?;
            if current != original {
                self.wait_for_page_load(Instant::now() + self.page_load_timeout)
                    .await;
                return Ok(self.client()?.current_url().await.unwrap_or(current));
            }
            if Instant::now() >= deadline {
                return Ok(current);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn go_back(&mut self) -> bool {
        let Ok(client) = self.client() else {
            return false;
        };
        if let Err(e) = client.back().await {
            handle_navigation_error(&e, "going back", self.worker_id);
            return false;
        }
        self.wait_for_page_load(Instant::now() + self.page_load_timeout)
            .await
    }

    async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Worker {} failed to close client: {}", self.worker_id, e);
            } else {
                ::log::debug!("Worker {} closed its WebDriver session", self.worker_id);
            }
        }
    }
}

impl Drop for WebDriverContext {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            let worker_id = self.worker_id;
            self.runtime.spawn(async move {
                if let Err(e) = client.close().await {
                    ::log::warn!("Worker {} failed to close client on drop: {}", worker_id, e);
                }
            });
        }
    }
}
