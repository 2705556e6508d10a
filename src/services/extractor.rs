use scraper::{ElementRef, Html};
use tokio::time;
use url::Url;

use crate::{
    configuration::{DelayRange, ScraperSettings},
    domain::{
        bank::{Bank, Branch, Review},
        selectors::CompiledSelectors,
        unit::{SkipReason, Unit},
    },
    errors::{ExtractError, ParseError, ScrollError, SessionError},
    services::{LinkCollector, PageSession, StabilizingScroller},
};

/// One bank's branches plus what was left behind on the way.
#[derive(Debug)]
pub struct BankExtraction {
    pub bank: Bank,
    pub skipped_branches: Vec<SkippedBranch>,
    pub skipped_reviews: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBranch {
    pub url: String,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct BranchExtraction {
    pub branch: Branch,
    pub skipped_reviews: usize,
}

#[derive(Debug, Default, PartialEq)]
pub struct ReviewHarvest {
    pub reviews: Vec<Review>,
    pub skipped: usize,
}

/// Why a unit stopped early: skip it, or abort the whole run.
enum Abort {
    Skip(SkipReason),
    Fatal(ExtractError),
}

impl From<SessionError> for Abort {
    fn from(e: SessionError) -> Self {
        if e.is_fatal() {
            return Abort::Fatal(ExtractError::SessionLost(e));
        }
        match e {
            SessionError::Navigation { .. } => Abort::Skip(SkipReason::Navigation(e.to_string())),
            _ => Abort::Skip(SkipReason::Parse(e.to_string())),
        }
    }
}

impl From<ParseError> for Abort {
    fn from(e: ParseError) -> Self {
        Abort::Skip(SkipReason::Parse(e.to_string()))
    }
}

/// Builds the search page URL for a bank.
///
/// The bank name is lowercased and stripped down to ASCII alphanumerics and whitespace, with
/// spaces turned into `+`. The geography qualifier words follow, also `+`-joined.
pub fn search_url(base: &str, bank_name: &str, qualifier: &str) -> String {
    let term = bank_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .replace(' ', "+");
    let qualifier = qualifier.split_whitespace().collect::<Vec<_>>().join("+");

    match qualifier.is_empty() {
        true => format!("{}{}", base, term),
        false => format!("{}{}+{}", base, term, qualifier),
    }
}

async fn settle(range: DelayRange) {
    time::sleep(range.sample()).await;
}

/// Walks bank → branch → review for one bank through a live page session.
pub struct HierarchicalExtractor<'a, S: PageSession> {
    session: &'a S,
    selectors: &'a CompiledSelectors,
    settings: &'a ScraperSettings,
    results_scroller: StabilizingScroller,
    reviews_scroller: StabilizingScroller,
}

impl<'a, S: PageSession> HierarchicalExtractor<'a, S> {
    pub fn new(
        session: &'a S,
        selectors: &'a CompiledSelectors,
        settings: &'a ScraperSettings,
    ) -> Self {
        HierarchicalExtractor {
            session,
            selectors,
            settings,
            results_scroller: StabilizingScroller::from_settings(&settings.results_scroll),
            reviews_scroller: StabilizingScroller::from_settings(&settings.reviews_scroll),
        }
    }

    pub async fn extract_bank(
        &self,
        bank_name: &str,
    ) -> Result<Unit<BankExtraction>, ExtractError> {
        let url = search_url(
            &self.settings.search_base_url,
            bank_name,
            &self.settings.geography_qualifier,
        );
        log::info!("Extracting bank {} from {}", bank_name, url);

        if let Err(e) = self.session.navigate(&url).await {
            return match Abort::from(e) {
                Abort::Fatal(e) => Err(e),
                Abort::Skip(reason) => {
                    log::error!("Skipping bank {}: {}", bank_name, reason);
                    Ok(Unit::Skipped(reason))
                }
            };
        }
        settle(self.settings.search_settle).await;

        self.expand_results().await?;
        let links = self.branch_links().await?;
        log::info!("Found {} branch links for {}", links.len(), bank_name);

        let mut extraction = BankExtraction {
            bank: Bank::new(bank_name),
            skipped_branches: vec![],
            skipped_reviews: 0,
        };

        for (index, link) in links.iter().enumerate() {
            log::info!("Branch {}/{} of {}", index + 1, links.len(), bank_name);

            match self.extract_branch(link.as_str()).await? {
                Unit::Done(done) => {
                    extraction.skipped_reviews += done.skipped_reviews;
                    extraction.bank.branches.push(done.branch);
                }
                Unit::Skipped(reason) => {
                    log::warn!("Skipping branch {}: {}", link, reason);
                    extraction.skipped_branches.push(SkippedBranch {
                        url: link.to_string(),
                        reason,
                    });
                }
            }
        }

        Ok(Unit::Done(extraction))
    }

    pub async fn extract_branch(
        &self,
        url: &str,
    ) -> Result<Unit<BranchExtraction>, ExtractError> {
        match self.try_branch(url).await {
            Ok(done) => Ok(Unit::Done(done)),
            Err(Abort::Skip(reason)) => Ok(Unit::Skipped(reason)),
            Err(Abort::Fatal(e)) => Err(e),
        }
    }

    /// Waits for the result list and scrolls it out. Whatever rendered is used when this fails.
    async fn expand_results(&self) -> Result<(), ExtractError> {
        let container = match self
            .session
            .wait_for_element(&self.selectors.results_container, self.settings.element_wait())
            .await
        {
            Ok(container) => container,
            Err(e) => {
                return match Abort::from(e) {
                    Abort::Fatal(e) => Err(e),
                    Abort::Skip(reason) => {
                        log::warn!("Result list unavailable, reading what rendered: {}", reason);
                        Ok(())
                    }
                }
            }
        };

        self.stabilize(&self.results_scroller, &container, "result list")
            .await
    }

    async fn branch_links(&self) -> Result<Vec<Url>, ExtractError> {
        let page = match self.session.page_source().await {
            Ok(html) => self.session.current_url().await.map(|base| (html, base)),
            Err(e) => Err(e),
        };

        match page {
            Ok((html, base)) => {
                Ok(LinkCollector::new(&self.selectors.branch_link).collect(&html, &base))
            }
            Err(e) => match Abort::from(e) {
                Abort::Fatal(e) => Err(e),
                Abort::Skip(reason) => {
                    log::warn!("Could not read the result page: {}", reason);
                    Ok(vec![])
                }
            },
        }
    }

    async fn try_branch(&self, url: &str) -> Result<BranchExtraction, Abort> {
        let s = self.selectors;

        self.session.navigate(url).await?;
        settle(self.settings.branch_settle).await;

        let header = self.session.find_element(&s.branch_header).await?;
        let name = self.session.find_within(&header, &s.branch_name).await?;
        let name = self.session.text(&name).await?.trim().to_string();
        if name.is_empty() {
            return Err(ParseError::MissingField("branch name").into());
        }

        let address = self.session.find_element(&s.branch_address).await?;
        let address = self
            .session
            .attribute(&address, &s.address_attribute)
            .await?
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ParseError::MissingAttribute {
                element: "branch address",
                attribute: s.address_attribute.clone(),
            })?;

        let harvest = self.extract_reviews(&name).await.map_err(Abort::Fatal)?;

        Ok(BranchExtraction {
            branch: Branch {
                name,
                address,
                reviews: harvest.reviews,
            },
            skipped_reviews: harvest.skipped,
        })
    }

    /// Reviews are best effort: a branch without a usable reviews panel keeps an empty list.
    async fn extract_reviews(&self, branch_name: &str) -> Result<ReviewHarvest, ExtractError> {
        let container = match self.open_reviews_panel().await {
            Ok(container) => container,
            Err(Abort::Fatal(e)) => return Err(e),
            Err(Abort::Skip(reason)) => {
                log::warn!("No reviews panel for {}: {}", branch_name, reason);
                return Ok(ReviewHarvest::default());
            }
        };

        self.stabilize(&self.reviews_scroller, &container, "review list")
            .await?;
        let revealed = self.reveal_full_texts().await?;

        let html = match self.session.page_source().await {
            Ok(html) => html,
            Err(e) => {
                return match Abort::from(e) {
                    Abort::Fatal(e) => Err(e),
                    Abort::Skip(reason) => {
                        log::warn!("Could not read reviews of {}: {}", branch_name, reason);
                        Ok(ReviewHarvest::default())
                    }
                }
            }
        };

        let harvest = parse_reviews(&html, self.selectors);
        log::info!(
            "Parsed {} reviews for {} ({} expanded, {} cards skipped)",
            harvest.reviews.len(),
            branch_name,
            revealed,
            harvest.skipped
        );
        Ok(harvest)
    }

    async fn open_reviews_panel(&self) -> Result<S::Element, Abort> {
        let s = self.selectors;

        let tabs = self.session.find_elements(&s.reviews_tab).await?;
        let tab = tabs
            .get(s.reviews_tab_index)
            .ok_or(ParseError::MissingField("reviews tab"))?;
        self.session.click(tab).await?;
        settle(self.settings.panel_settle).await;

        self.session
            .wait_for_element(&s.reviews_loaded, self.settings.element_wait())
            .await?;
        Ok(self.session.find_element(&s.review_container).await?)
    }

    /// Clicks every "more" control. A failed click leaves that review truncated.
    async fn reveal_full_texts(&self) -> Result<usize, ExtractError> {
        let buttons = match self.session.find_elements(&self.selectors.reveal_more).await {
            Ok(buttons) => buttons,
            Err(e) if e.is_fatal() => return Err(ExtractError::SessionLost(e)),
            Err(e) => {
                log::debug!("No reveal-more controls: {}", e);
                return Ok(0);
            }
        };

        let mut revealed = 0;
        for button in &buttons {
            match self.session.click(button).await {
                Ok(()) => {
                    revealed += 1;
                    settle(self.settings.reveal_settle).await;
                }
                Err(e) if e.is_fatal() => return Err(ExtractError::SessionLost(e)),
                Err(e) => log::debug!("Reveal-more click failed: {}", e),
            }
        }
        Ok(revealed)
    }

    async fn stabilize(
        &self,
        scroller: &StabilizingScroller,
        container: &S::Element,
        what: &str,
    ) -> Result<(), ExtractError> {
        match scroller.expand_until_stable(self.session, container).await {
            Ok(done) => {
                log::info!("{} settled at extent {} after {} rounds", what, done.extent, done.rounds);
                Ok(())
            }
            Err(ScrollError::Session(e)) if e.is_fatal() => Err(ExtractError::SessionLost(e)),
            Err(e) => {
                log::warn!("{} did not settle, continuing with what rendered: {}", what, e);
                Ok(())
            }
        }
    }
}

/// Parses every rendered review card. Cards that fail to parse are counted, not returned.
pub fn parse_reviews(html: &str, selectors: &CompiledSelectors) -> ReviewHarvest {
    let document = Html::parse_document(html);
    let mut harvest = ReviewHarvest::default();

    for card in document.select(&selectors.review_card) {
        match parse_review_card(card, selectors) {
            Ok(review) => harvest.reviews.push(review),
            Err(e) => {
                log::debug!("Skipping review card: {}", e);
                harvest.skipped += 1;
            }
        }
    }
    harvest
}

fn parse_review_card(card: ElementRef, selectors: &CompiledSelectors) -> Result<Review, ParseError> {
    let text = card.select(&selectors.review_text).next().map(element_text);
    let date_label = card.select(&selectors.review_date).next().map(element_text);

    // A rating element without its label means the card rendered half way.
    let rating_label = match card.select(&selectors.review_rating).next() {
        Some(rating) => Some(
            rating
                .value()
                .attr(&selectors.rating_attribute)
                .ok_or_else(|| ParseError::MissingAttribute {
                    element: "review rating",
                    attribute: selectors.rating_attribute.clone(),
                })?
                .to_string(),
        ),
        None => None,
    };

    Ok(Review {
        text,
        rating_label,
        date_label,
    })
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
