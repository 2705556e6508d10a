use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};

use crate::{
    domain::staging_row::{flatten, StagingRow},
    errors::LoadError,
    services::artifact,
};

/// Transactional sink for staging rows.
#[async_trait]
pub trait StagingStore: Send + Sync {
    type Transaction: Send;

    async fn ensure_schema(&self) -> Result<(), sqlx::Error>;

    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error>;

    /// A failed insert must leave the transaction usable for the following rows.
    async fn insert_row(
        &self,
        tx: &mut Self::Transaction,
        row: &StagingRow,
    ) -> Result<(), sqlx::Error>;

    async fn commit(&self, tx: Self::Transaction) -> Result<(), sqlx::Error>;

    async fn rollback(&self, tx: Self::Transaction) -> Result<(), sqlx::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    Failed(RowFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub index: usize,
    pub error: String,
}

/// Per-row outcomes of one load attempt.
#[derive(Debug, Default)]
pub struct LoadReport {
    outcomes: Vec<RowOutcome>,
}

impl LoadReport {
    pub fn record(&mut self, outcome: RowOutcome) {
        self.outcomes.push(outcome);
    }

    /// Commit only when every attempted row went in.
    pub fn should_commit(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, RowOutcome::Inserted))
    }

    pub fn failures(&self) -> Vec<RowFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RowOutcome::Failed(failure) => Some(failure.clone()),
                RowOutcome::Inserted => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub committed: bool,
    pub row_count: usize,
    pub failures: Vec<RowFailure>,
    pub renamed_to: Option<PathBuf>,
}

pub struct StagingLoader<S: StagingStore> {
    store: S,
}

impl<S: StagingStore> StagingLoader<S> {
    pub fn new(store: S) -> Self {
        StagingLoader { store }
    }

    pub async fn load(&self, artifact_path: &Path) -> Result<LoadResult, LoadError> {
        self.load_at(artifact_path, Local::now().naive_local()).await
    }

    /// Inserts every row of the artifact in one transaction.
    ///
    /// Either all rows are committed and the artifact is renamed with the `now` timestamp, or
    /// nothing is committed and the artifact keeps its pending name for the next attempt.
    pub async fn load_at(
        &self,
        artifact_path: &Path,
        now: NaiveDateTime,
    ) -> Result<LoadResult, LoadError> {
        if !artifact_path.is_file() {
            return Err(LoadError::ArtifactMissing(artifact_path.to_path_buf()));
        }

        self.store.ensure_schema().await?;
        let document = artifact::read(artifact_path)?;
        let rows = flatten(&document, now.date());
        log::info!(
            "Loading {} staging rows from {}",
            rows.len(),
            artifact_path.display()
        );

        let mut tx = self.store.begin().await?;
        let mut report = LoadReport::default();

        for (index, row) in rows.iter().enumerate() {
            match self.store.insert_row(&mut tx, row).await {
                Ok(()) => report.record(RowOutcome::Inserted),
                Err(e) => {
                    log::error!(
                        "Staging row {} ({} / {}) rejected: {}",
                        index,
                        row.bank_name,
                        row.branch_name,
                        e
                    );
                    report.record(RowOutcome::Failed(RowFailure {
                        index,
                        error: e.to_string(),
                    }));
                }
            }
        }

        if !report.should_commit() {
            self.store.rollback(tx).await?;
            let failures = report.failures();
            log::error!(
                "Rolled back all {} rows ({} failed); {} keeps its name for a retry",
                rows.len(),
                failures.len(),
                artifact_path.display()
            );
            return Ok(LoadResult {
                committed: false,
                row_count: 0,
                failures,
                renamed_to: None,
            });
        }

        self.store.commit(tx).await?;
        let renamed = artifact::mark_completed(artifact_path, now).map_err(|source| {
            log::error!(
                "Rows from {} are committed but the artifact could not be renamed: {}",
                artifact_path.display(),
                source
            );
            LoadError::MarkerFailed {
                path: artifact_path.to_path_buf(),
                source,
            }
        })?;

        log::info!(
            "Committed {} staging rows, artifact renamed to {}",
            rows.len(),
            renamed.display()
        );
        Ok(LoadResult {
            committed: true,
            row_count: rows.len(),
            failures: vec![],
            renamed_to: Some(renamed),
        })
    }
}
