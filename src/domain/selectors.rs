use std::fmt;

use scraper::Selector;
use serde::Deserialize;

use crate::errors::SelectorError;

/// How a live element is located in the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(css) => write!(f, "css `{}`", css),
            Locator::XPath(xpath) => write!(f, "xpath `{}`", xpath),
        }
    }
}

/// Logical page roles mapped to selector strings.
///
/// Roles typed as `Locator` are looked up in the live browser. Plain strings are CSS selectors
/// run against the rendered page source.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorTable {
    pub results_container: Locator,
    pub branch_link: String,
    pub branch_header: Locator,
    pub branch_name: Locator,
    pub branch_address: Locator,
    pub address_attribute: String,
    pub reviews_tab: Locator,
    pub reviews_tab_index: usize,
    pub reviews_loaded: Locator,
    pub review_container: Locator,
    pub reveal_more: Locator,
    pub review_card: String,
    pub review_text: String,
    pub review_rating: String,
    pub rating_attribute: String,
    pub review_date: String,
}

/// Selector table with every markup selector parsed up front.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub results_container: Locator,
    pub branch_link: Selector,
    pub branch_header: Locator,
    pub branch_name: Locator,
    pub branch_address: Locator,
    pub address_attribute: String,
    pub reviews_tab: Locator,
    pub reviews_tab_index: usize,
    pub reviews_loaded: Locator,
    pub review_container: Locator,
    pub reveal_more: Locator,
    pub review_card: Selector,
    pub review_text: Selector,
    pub review_rating: Selector,
    pub rating_attribute: String,
    pub review_date: Selector,
}

impl Default for SelectorTable {
    fn default() -> Self {
        let css = |s: &str| Locator::Css(s.to_string());

        SelectorTable {
            results_container: Locator::XPath(
                "//*[contains(@class, 'm6QErb DxyBCb kA9KIf') and @aria-label and @tabindex]"
                    .to_string(),
            ),
            branch_link: "a.hfpxzc".to_string(),
            branch_header: css(".tAiQdd"),
            branch_name: css("h1.DUwDvf.lfPIob"),
            branch_address: css(".CsEnBe"),
            address_attribute: "aria-label".to_string(),
            reviews_tab: css(".hh2c6"),
            reviews_tab_index: 1,
            reviews_loaded: css(".aIFcqe"),
            review_container: css(".m6QErb.DxyBCb.kA9KIf.dS8AEf.XiKgde"),
            reveal_more: css(".w8nwRe"),
            review_card: "div.jftiEf.fontBodyMedium".to_string(),
            review_text: ".wiI7pd".to_string(),
            review_rating: ".kvMYJc".to_string(),
            rating_attribute: "aria-label".to_string(),
            review_date: ".rsqaWe".to_string(),
        }
    }
}

impl SelectorTable {
    pub fn compile(&self) -> Result<CompiledSelectors, SelectorError> {
        for (role, locator) in [
            ("results_container", &self.results_container),
            ("branch_header", &self.branch_header),
            ("branch_name", &self.branch_name),
            ("branch_address", &self.branch_address),
            ("reviews_tab", &self.reviews_tab),
            ("reviews_loaded", &self.reviews_loaded),
            ("review_container", &self.review_container),
            ("reveal_more", &self.reveal_more),
        ] {
            check_locator(role, locator)?;
        }

        Ok(CompiledSelectors {
            results_container: self.results_container.clone(),
            branch_link: parse("branch_link", &self.branch_link)?,
            branch_header: self.branch_header.clone(),
            branch_name: self.branch_name.clone(),
            branch_address: self.branch_address.clone(),
            address_attribute: self.address_attribute.clone(),
            reviews_tab: self.reviews_tab.clone(),
            reviews_tab_index: self.reviews_tab_index,
            reviews_loaded: self.reviews_loaded.clone(),
            review_container: self.review_container.clone(),
            reveal_more: self.reveal_more.clone(),
            review_card: parse("review_card", &self.review_card)?,
            review_text: parse("review_text", &self.review_text)?,
            review_rating: parse("review_rating", &self.review_rating)?,
            rating_attribute: self.rating_attribute.clone(),
            review_date: parse("review_date", &self.review_date)?,
        })
    }
}

fn parse(role: &'static str, selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|_| SelectorError::Invalid {
        role,
        selector: selector.to_string(),
    })
}

fn check_locator(role: &'static str, locator: &Locator) -> Result<(), SelectorError> {
    match locator {
        Locator::Css(css) => parse(role, css).map(|_| ()),
        Locator::XPath(xpath) if xpath.trim().is_empty() => Err(SelectorError::Invalid {
            role,
            selector: xpath.clone(),
        }),
        Locator::XPath(_) => Ok(()),
    }
}
