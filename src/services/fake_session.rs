//! Scripted in-memory browser used by the extraction tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::{
    domain::selectors::Locator,
    errors::SessionError,
    services::{PageSession, SCROLL_EXTENT_SCRIPT, SCROLL_TO_EXTENT_SCRIPT},
};

const BASE_EXTENT: i64 = 1_000;

#[derive(Debug, Clone, Copy)]
pub enum Growth {
    /// Grows by `step` on each of the first `rounds` scrolls, then stays put.
    Settles { rounds: usize, step: i64 },
    Endless { step: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    pub key: String,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct FakePage {
    html: String,
    elements: HashMap<String, usize>,
    texts: HashMap<String, String>,
    attributes: HashMap<(String, String), String>,
    failing_clicks: HashSet<String>,
    growth: Growth,
    scrolls: usize,
}

impl FakePage {
    pub fn new(html: &str) -> Self {
        FakePage {
            html: html.to_string(),
            elements: HashMap::new(),
            texts: HashMap::new(),
            attributes: HashMap::new(),
            failing_clicks: HashSet::new(),
            growth: Growth::Settles { rounds: 0, step: 0 },
            scrolls: 0,
        }
    }

    pub fn with(mut self, selector: &str, count: usize) -> Self {
        self.elements.insert(selector.to_string(), count);
        self
    }

    pub fn text(mut self, selector: &str, text: &str) -> Self {
        self.elements.entry(selector.to_string()).or_insert(1);
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn attr(mut self, selector: &str, name: &str, value: &str) -> Self {
        self.elements.entry(selector.to_string()).or_insert(1);
        self.attributes
            .insert((selector.to_string(), name.to_string()), value.to_string());
        self
    }

    pub fn failing_click(mut self, selector: &str) -> Self {
        self.failing_clicks.insert(selector.to_string());
        self
    }

    pub fn growth(mut self, growth: Growth) -> Self {
        self.growth = growth;
        self
    }

    fn extent(&self) -> i64 {
        let grown = match self.growth {
            Growth::Settles { rounds, step } => self.scrolls.min(rounds) as i64 * step,
            Growth::Endless { step } => self.scrolls as i64 * step,
        };
        BASE_EXTENT + grown
    }
}

#[derive(Default)]
struct State {
    pages: HashMap<String, FakePage>,
    current: Option<String>,
    visits: Vec<String>,
    clicks: Vec<String>,
    dead: bool,
}

#[derive(Default)]
pub struct FakeSession {
    state: Mutex<State>,
}

fn key(locator: &Locator) -> &str {
    match locator {
        Locator::Css(s) | Locator::XPath(s) => s,
    }
}

impl FakeSession {
    pub fn new() -> Self {
        FakeSession::default()
    }

    pub fn page(self, url: &str, page: FakePage) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), page);
        self
    }

    /// Every later command fails as if the browser had crashed.
    pub fn kill(&self) {
        self.state.lock().unwrap().dead = true;
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn scrolls_on(&self, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .pages
            .get(url)
            .map(|p| p.scrolls)
            .unwrap_or(0)
    }

    fn with_page<T>(
        &self,
        f: impl FnOnce(&mut FakePage) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.dead {
            return Err(SessionError::Connection("browser crashed".to_string()));
        }
        let current = state
            .current
            .clone()
            .ok_or_else(|| SessionError::Script("no page loaded".to_string()))?;
        let page = state
            .pages
            .get_mut(&current)
            .ok_or_else(|| SessionError::Script("page vanished".to_string()))?;
        f(page)
    }
}

#[async_trait]
impl PageSession for FakeSession {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.dead {
            return Err(SessionError::Connection("browser crashed".to_string()));
        }
        state.visits.push(url.to_string());
        if state.pages.contains_key(url) {
            state.current = Some(url.to_string());
            Ok(())
        } else {
            Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_TIMED_OUT".to_string(),
            })
        }
    }

    async fn current_url(&self) -> Result<Url, SessionError> {
        let state = self.state.lock().unwrap();
        let current = state.current.as_deref().unwrap_or("about:blank");
        Url::parse(current).map_err(|e| SessionError::Script(e.to_string()))
    }

    async fn page_source(&self) -> Result<String, SessionError> {
        self.with_page(|page| Ok(page.html.clone()))
    }

    async fn find_element(&self, locator: &Locator) -> Result<FakeElement, SessionError> {
        self.with_page(|page| match page.elements.get(key(locator)) {
            Some(&count) if count > 0 => Ok(FakeElement {
                key: key(locator).to_string(),
                index: 0,
            }),
            _ => Err(SessionError::NotFound {
                locator: locator.to_string(),
            }),
        })
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<FakeElement>, SessionError> {
        self.with_page(|page| {
            let count = page.elements.get(key(locator)).copied().unwrap_or(0);
            Ok((0..count)
                .map(|index| FakeElement {
                    key: key(locator).to_string(),
                    index,
                })
                .collect())
        })
    }

    async fn find_within(
        &self,
        _parent: &FakeElement,
        locator: &Locator,
    ) -> Result<FakeElement, SessionError> {
        self.find_element(locator).await
    }

    async fn text(&self, element: &FakeElement) -> Result<String, SessionError> {
        self.with_page(|page| Ok(page.texts.get(&element.key).cloned().unwrap_or_default()))
    }

    async fn attribute(
        &self,
        element: &FakeElement,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        self.with_page(|page| {
            Ok(page
                .attributes
                .get(&(element.key.clone(), name.to_string()))
                .cloned())
        })
    }

    async fn click(&self, element: &FakeElement) -> Result<(), SessionError> {
        let fails = self.with_page(|page| Ok(page.failing_clicks.contains(&element.key)))?;
        if fails {
            return Err(SessionError::Interaction(format!(
                "element {}#{} is not clickable",
                element.key, element.index
            )));
        }
        self.state
            .lock()
            .unwrap()
            .clicks
            .push(format!("{}#{}", element.key, element.index));
        Ok(())
    }

    async fn run_script(
        &self,
        script: &str,
        args: &[&FakeElement],
    ) -> Result<Value, SessionError> {
        if args.is_empty() {
            return Err(SessionError::Script("missing target element".to_string()));
        }
        self.with_page(|page| match script {
            SCROLL_EXTENT_SCRIPT => Ok(json!(page.extent())),
            SCROLL_TO_EXTENT_SCRIPT => {
                page.scrolls += 1;
                Ok(Value::Null)
            }
            other => Err(SessionError::Script(format!("unsupported script {}", other))),
        })
    }
}
