use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// Harvests branch links from rendered markup.
pub struct LinkCollector<'a> {
    branch_link: &'a Selector,
}

impl<'a> LinkCollector<'a> {
    pub fn new(branch_link: &'a Selector) -> Self {
        LinkCollector { branch_link }
    }

    /// Every distinct `href` of a branch card, resolved against `base`, in document order.
    /// No branch cards is a valid answer and yields an empty list.
    pub fn collect(&self, html: &str, base: &Url) -> Vec<Url> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();

        document
            .select(self.branch_link)
            .filter_map(|tag| tag.value().attr("href"))
            .filter_map(|href| match base.join(href) {
                Ok(url) => Some(url),
                Err(e) => {
                    log::warn!("Ignoring unusable branch link {}: {}", href, e);
                    None
                }
            })
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.google.com/maps/search/cih+bank").unwrap()
    }

    #[test]
    fn collects_branch_cards_only() {
        let html = r#"
            <div role="feed">
                <a class="hfpxzc" href="https://www.google.com/maps/place/CIH+Agdal">Agdal</a>
                <a class="other" href="https://www.google.com/maps/place/Ad">Sponsored</a>
                <a class="hfpxzc" href="/maps/place/CIH+Hassan">Hassan</a>
                <a class="hfpxzc">no link</a>
            </div>
        "#;
        let selector = Selector::parse("a.hfpxzc").unwrap();

        let links = LinkCollector::new(&selector).collect(html, &base());

        assert_eq!(
            links.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec![
                "https://www.google.com/maps/place/CIH+Agdal",
                "https://www.google.com/maps/place/CIH+Hassan",
            ]
        );
    }

    #[test]
    fn repeated_cards_are_visited_once() {
        let html = r#"
            <a class="hfpxzc" href="https://www.google.com/maps/place/A">A</a>
            <a class="hfpxzc" href="https://www.google.com/maps/place/B">B</a>
            <a class="hfpxzc" href="https://www.google.com/maps/place/A">A again</a>
        "#;
        let selector = Selector::parse("a.hfpxzc").unwrap();

        let links = LinkCollector::new(&selector).collect(html, &base());

        assert_eq!(links.len(), 2);
        assert_eq!(links[1].as_str(), "https://www.google.com/maps/place/B");
    }

    #[test]
    fn page_without_cards_yields_nothing() {
        let selector = Selector::parse("a.hfpxzc").unwrap();

        let links = LinkCollector::new(&selector).collect("<html><body></body></html>", &base());

        assert!(links.is_empty());
    }
}
