use chrono::NaiveDate;

use super::bank::RunDocument;

/// Load-ready projection of one review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingRow {
    pub bank_name: String,
    pub branch_name: String,
    pub location: String,
    pub review_text: Option<String>,
    pub rating: Option<String>,
    pub review_date: Option<String>,
    pub scraping_date: NaiveDate,
}

/// Flattens the document in bank, branch, review order. Branches without reviews yield no rows.
pub fn flatten(document: &RunDocument, scraping_date: NaiveDate) -> Vec<StagingRow> {
    document
        .banks
        .iter()
        .flat_map(|bank| {
            bank.branches.iter().flat_map(move |branch| {
                branch.reviews.iter().map(move |review| StagingRow {
                    bank_name: bank.name.clone(),
                    branch_name: branch.name.clone(),
                    location: branch.address.clone(),
                    review_text: review.text.clone(),
                    rating: review.rating_label.clone(),
                    review_date: review.date_label.clone(),
                    scraping_date,
                })
            })
        })
        .collect()
}
