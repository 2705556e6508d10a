use serde::{Deserialize, Serialize};

/// Everything scraped in one invocation. Serialized as a bare JSON array of banks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunDocument {
    pub banks: Vec<Bank>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    #[serde(rename = "Bank_name")]
    pub name: String,
    #[serde(rename = "Branches", default)]
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(rename = "branch_name")]
    pub name: String,
    #[serde(rename = "location")]
    pub address: String,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

/// One rendered review card. Any label the card did not carry stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "review_text", default)]
    pub text: Option<String>,
    #[serde(rename = "review_rating", default)]
    pub rating_label: Option<String>,
    #[serde(rename = "review_date", default)]
    pub date_label: Option<String>,
}

impl Bank {
    pub fn new(name: impl Into<String>) -> Self {
        Bank {
            name: name.into(),
            branches: vec![],
        }
    }

    pub fn review_count(&self) -> usize {
        self.branches.iter().map(|b| b.reviews.len()).sum()
    }
}

impl RunDocument {
    pub fn review_count(&self) -> usize {
        self.banks.iter().map(Bank::review_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_artifact_shape() {
        let json = r#"[{"Bank_name":"X","Branches":[{"branch_name":"B1","location":"L1","reviews":[{"review_text":"good","review_rating":"5","review_date":"1 week ago"}]}]}]"#;
        let document: RunDocument = serde_json::from_str(json).unwrap();

        assert_eq!(document.banks.len(), 1);
        let branch = &document.banks[0].branches[0];
        assert_eq!(branch.name, "B1");
        assert_eq!(branch.address, "L1");
        assert_eq!(
            branch.reviews[0],
            Review {
                text: Some("good".to_string()),
                rating_label: Some("5".to_string()),
                date_label: Some("1 week ago".to_string()),
            }
        );
    }

    #[test]
    fn tolerates_missing_lists_and_null_labels() {
        let json = r#"[
            {"Bank_name":"Empty"},
            {"Bank_name":"Y","Branches":[
                {"branch_name":"B","location":"L"},
                {"branch_name":"C","location":"M","reviews":[{"review_text":null,"review_rating":"4"}]}
            ]}
        ]"#;
        let document: RunDocument = serde_json::from_str(json).unwrap();

        assert!(document.banks[0].branches.is_empty());
        assert!(document.banks[1].branches[0].reviews.is_empty());
        let review = &document.banks[1].branches[1].reviews[0];
        assert_eq!(review.text, None);
        assert_eq!(review.rating_label.as_deref(), Some("4"));
        assert_eq!(review.date_label, None);
        assert_eq!(document.review_count(), 1);
    }

    #[test]
    fn absent_labels_serialize_as_null() {
        let bank = Bank {
            name: "Z".to_string(),
            branches: vec![Branch {
                name: "B".to_string(),
                address: "L".to_string(),
                reviews: vec![Review::default()],
            }],
        };
        let value = serde_json::to_value(RunDocument { banks: vec![bank] }).unwrap();

        assert_eq!(
            value[0]["Branches"][0]["reviews"][0],
            serde_json::json!({"review_text": null, "review_rating": null, "review_date": null})
        );
    }
}
