use std::{future::Future, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thirtyfour::prelude::*;
use tokio::time::{self, Instant};
use url::Url;

use crate::{configuration::BrowserSettings, domain::selectors::Locator, errors::SessionError};

pub const SCROLL_EXTENT_SCRIPT: &str = "return arguments[0].scrollHeight;";
pub const SCROLL_TO_EXTENT_SCRIPT: &str = "arguments[0].scrollTop = arguments[0].scrollHeight;";

const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One interactive browser session. Nothing here retries; callers decide.
#[async_trait]
pub trait PageSession: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    async fn current_url(&self) -> Result<Url, SessionError>;

    async fn page_source(&self) -> Result<String, SessionError>;

    async fn find_element(&self, locator: &Locator) -> Result<Self::Element, SessionError>;

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<Self::Element>, SessionError>;

    async fn find_within(
        &self,
        parent: &Self::Element,
        locator: &Locator,
    ) -> Result<Self::Element, SessionError>;

    async fn text(&self, element: &Self::Element) -> Result<String, SessionError>;

    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    async fn click(&self, element: &Self::Element) -> Result<(), SessionError>;

    async fn run_script(
        &self,
        script: &str,
        args: &[&Self::Element],
    ) -> Result<Value, SessionError>;

    async fn wait_for_element(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Self::Element, SessionError> {
        wait_until(&locator.to_string(), timeout, ELEMENT_POLL_INTERVAL, || async move {
            match self.find_element(locator).await {
                Ok(element) => Ok(Some(element)),
                Err(SessionError::NotFound { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn scroll_extent(&self, container: &Self::Element) -> Result<i64, SessionError> {
        let value = self.run_script(SCROLL_EXTENT_SCRIPT, &[container]).await?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.round() as i64))
            .ok_or_else(|| SessionError::Script(format!("scroll extent is not a number: {}", value)))
    }

    async fn scroll_to_extent(&self, container: &Self::Element) -> Result<(), SessionError> {
        self.run_script(SCROLL_TO_EXTENT_SCRIPT, &[container])
            .await
            .map(|_| ())
    }
}

/// Polls `probe` until it yields a value, fails, or `timeout` elapses.
pub async fn wait_until<T, F, Fut>(
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut probe: F,
) -> Result<T, SessionError>
where
    T: Send,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>, SessionError>> + Send,
{
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(SessionError::Timeout {
                what: what.to_string(),
                waited: timeout,
            });
        }
        time::sleep(poll.min(deadline - now)).await;
    }
}

pub struct Droid {
    pub driver: WebDriver,
}

impl Droid {
    pub async fn new(settings: &BrowserSettings) -> Result<Self, SessionError> {
        let mut caps = DesiredCapabilities::chrome();
        let unavailable = |e: thirtyfour::error::WebDriverError| SessionError::Connection(e.to_string());

        if settings.headless {
            caps.add_arg("--headless=new").map_err(unavailable)?;
        }
        if settings.no_sandbox {
            caps.add_arg("--no-sandbox").map_err(unavailable)?;
        }
        if settings.disable_dev_shm_usage {
            caps.add_arg("--disable-dev-shm-usage").map_err(unavailable)?;
        }
        if let Some(binary) = &settings.binary {
            caps.set_binary(binary).map_err(unavailable)?;
        }

        let driver = WebDriver::new(settings.webdriver_url.as_str(), caps)
            .await
            .map_err(unavailable)?;
        driver
            .set_page_load_timeout(Duration::from_secs(settings.page_load_timeout_secs))
            .await
            .map_err(unavailable)?;
        if !settings.headless {
            driver.maximize_window().await.map_err(unavailable)?;
        }

        log::info!("Browser session started on {}", settings.webdriver_url);
        Ok(Droid { driver })
    }

    pub async fn quit(self) {
        if let Err(e) = self.driver.quit().await {
            log::error!("Failed to close browser session: {:?}", e);
        }
    }
}

fn by(locator: &Locator) -> By {
    match locator {
        Locator::Css(css) => By::Css(css.as_str()),
        Locator::XPath(xpath) => By::XPath(xpath.as_str()),
    }
}

fn not_found(locator: &Locator) -> SessionError {
    SessionError::NotFound {
        locator: locator.to_string(),
    }
}

/// Chromedriver reports a crashed or detached browser as an unknown error with one of these.
const LOST_BROWSER_MESSAGES: [&str; 4] = [
    "chrome not reachable",
    "session deleted",
    "disconnected",
    "target window already closed",
];

fn session_lost(e: &WebDriverError) -> bool {
    match e {
        WebDriverError::InvalidSessionId(_)
        | WebDriverError::SessionNotCreated(_)
        | WebDriverError::NoSuchWindow(_)
        | WebDriverError::HttpError(_)
        | WebDriverError::IoError(_)
        | WebDriverError::RequestFailed(_)
        | WebDriverError::FatalError(_)
        | WebDriverError::CommandSendError(_)
        | WebDriverError::CommandRecvError(_) => true,
        WebDriverError::UnknownError(info) => {
            let message = info.value.message.to_lowercase();
            LOST_BROWSER_MESSAGES.iter().any(|m| message.contains(m))
        }
        _ => false,
    }
}

/// Maps a driver failure to `Connection` when the session is gone, otherwise to `otherwise`.
fn classify(e: WebDriverError, otherwise: fn(String) -> SessionError) -> SessionError {
    match session_lost(&e) {
        true => SessionError::Connection(e.to_string()),
        false => otherwise(e.to_string()),
    }
}

fn classify_lookup(e: WebDriverError, locator: &Locator) -> SessionError {
    match e {
        WebDriverError::NoSuchElement(_) => not_found(locator),
        e => classify(e, SessionError::Interaction),
    }
}

#[async_trait]
impl PageSession for Droid {
    type Element = WebElement;

    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        match self.driver.goto(url).await {
            Ok(()) => Ok(()),
            Err(e) if session_lost(&e) => Err(SessionError::Connection(e.to_string())),
            Err(e) => {
                // A dead browser fails every command, not only this navigation.
                if let Err(probe) = self.driver.title().await {
                    return Err(SessionError::Connection(probe.to_string()));
                }
                Err(SessionError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn current_url(&self) -> Result<Url, SessionError> {
        let url = self
            .driver
            .current_url()
            .await
            .map_err(|e| classify(e, SessionError::Script))?;
        Url::parse(url.as_str()).map_err(|e| SessionError::Script(e.to_string()))
    }

    async fn page_source(&self) -> Result<String, SessionError> {
        self.driver
            .source()
            .await
            .map_err(|e| classify(e, SessionError::Script))
    }

    async fn find_element(&self, locator: &Locator) -> Result<WebElement, SessionError> {
        self.driver
            .find(by(locator))
            .await
            .map_err(|e| classify_lookup(e, locator))
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<WebElement>, SessionError> {
        self.driver
            .find_all(by(locator))
            .await
            .map_err(|e| classify_lookup(e, locator))
    }

    async fn find_within(
        &self,
        parent: &WebElement,
        locator: &Locator,
    ) -> Result<WebElement, SessionError> {
        parent
            .find(by(locator))
            .await
            .map_err(|e| classify_lookup(e, locator))
    }

    async fn text(&self, element: &WebElement) -> Result<String, SessionError> {
        element
            .text()
            .await
            .map_err(|e| classify(e, SessionError::Interaction))
    }

    async fn attribute(
        &self,
        element: &WebElement,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        element
            .attr(name)
            .await
            .map_err(|e| classify(e, SessionError::Interaction))
    }

    async fn click(&self, element: &WebElement) -> Result<(), SessionError> {
        element
            .click()
            .await
            .map_err(|e| classify(e, SessionError::Interaction))
    }

    async fn run_script(&self, script: &str, args: &[&WebElement]) -> Result<Value, SessionError> {
        let args = args
            .iter()
            .map(|element| element.to_json())
            .collect::<Result<Vec<Value>, _>>()
            .map_err(|e| classify(e, SessionError::Script))?;

        let ret = self
            .driver
            .execute(script, args)
            .await
            .map_err(|e| classify(e, SessionError::Script))?;
        Ok(ret.json().clone())
    }
}
