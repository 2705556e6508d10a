use crate::{
    domain::{bank::RunDocument, unit::Unit},
    errors::ExtractError,
    services::{HierarchicalExtractor, PageSession},
};

/// Drives the extractor over every configured bank, one after the other.
pub struct RunAggregator<'a, S: PageSession> {
    extractor: HierarchicalExtractor<'a, S>,
}

impl<'a, S: PageSession> RunAggregator<'a, S> {
    pub fn new(extractor: HierarchicalExtractor<'a, S>) -> Self {
        RunAggregator { extractor }
    }

    /// Banks whose search page cannot be loaded are left out of the document.
    pub async fn run(&self, banks: &[String]) -> Result<RunDocument, ExtractError> {
        let mut document = RunDocument::default();

        for (index, bank) in banks.iter().enumerate() {
            log::info!("Bank {}/{}: {}", index + 1, banks.len(), bank);

            match self.extractor.extract_bank(bank).await? {
                Unit::Done(extraction) => {
                    log::info!(
                        "Bank {} done: {} branches, {} reviews, {} branches skipped, {} review cards skipped",
                        bank,
                        extraction.bank.branches.len(),
                        extraction.bank.review_count(),
                        extraction.skipped_branches.len(),
                        extraction.skipped_reviews
                    );
                    document.banks.push(extraction.bank);
                }
                Unit::Skipped(reason) => {
                    log::error!("Bank {} left out of this run: {}", bank, reason);
                }
            }
        }

        log::info!(
            "Extraction finished: {} of {} banks, {} reviews",
            document.banks.len(),
            banks.len(),
            document.review_count()
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        configuration::{DelayRange, ScraperSettings, ScrollSettings},
        domain::selectors::SelectorTable,
        services::fake_session::{FakePage, FakeSession},
    };

    fn settings(banks: &[&str]) -> ScraperSettings {
        let quick = DelayRange::new(0.5, 1.0);
        let scroll = ScrollSettings {
            poll: quick,
            budget_secs: 30,
            stable_reads: 1,
        };
        ScraperSettings {
            banks: banks.iter().map(|b| b.to_string()).collect(),
            geography_qualifier: "in Morocco".to_string(),
            search_base_url: "https://maps.test/search/".to_string(),
            element_wait_secs: 1,
            search_settle: quick,
            branch_settle: quick,
            panel_settle: quick,
            reveal_settle: quick,
            results_scroll: scroll.clone(),
            reviews_scroll: scroll,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_bank_is_left_out_and_order_is_kept() {
        let branch = FakePage::new("")
            .with(".tAiQdd", 1)
            .text("h1.DUwDvf.lfPIob", "Al Barid Agdal")
            .attr(".CsEnBe", "aria-label", "Agdal");
        let session = FakeSession::new()
            .page(
                "https://maps.test/search/al+barid+bank+in+Morocco",
                FakePage::new(r#"<a class="hfpxzc" href="https://maps.test/place/1">x</a>"#),
            )
            .page("https://maps.test/place/1", branch)
            .page(
                "https://maps.test/search/cfg+bank+in+Morocco",
                FakePage::new("<div></div>"),
            );
        let selectors = SelectorTable::default().compile().unwrap();
        let settings = settings(&["Al Barid Bank", "Umnia Bank", "CFG Bank"]);
        let aggregator =
            RunAggregator::new(HierarchicalExtractor::new(&session, &selectors, &settings));

        let document = aggregator.run(&settings.banks).await.unwrap();

        let names: Vec<_> = document.banks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Al Barid Bank", "CFG Bank"]);
        assert_eq!(document.banks[0].branches[0].name, "Al Barid Agdal");
        assert!(document.banks[1].branches.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lost_browser_ends_the_run() {
        let session = FakeSession::new();
        session.kill();
        let selectors = SelectorTable::default().compile().unwrap();
        let settings = settings(&["CIH Bank"]);
        let aggregator =
            RunAggregator::new(HierarchicalExtractor::new(&session, &selectors, &settings));

        let result = aggregator.run(&settings.banks).await;

        assert!(matches!(result, Err(ExtractError::SessionLost(_))));
    }
}
