use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    configuration::Settings,
    dal::staging_db::PgStagingStore,
    services::{artifact, Droid, HierarchicalExtractor, LoadResult, RunAggregator, StagingLoader},
};

/// Scrapes every configured bank and writes the pending artifact. Returns its path.
pub async fn run_extraction(settings: &Settings) -> anyhow::Result<PathBuf> {
    let selectors = settings.selectors.compile()?;
    let droid = Droid::new(&settings.browser)
        .await
        .context("Failed to start the browser session")?;

    let result = {
        let extractor = HierarchicalExtractor::new(&droid, &selectors, &settings.scraper);
        RunAggregator::new(extractor)
            .run(&settings.scraper.banks)
            .await
    };
    droid.quit().await;

    let document = result.context("Extraction run aborted")?;
    let path = settings.artifact.pending_path();
    artifact::write(&document, &path)?;
    Ok(path)
}

/// Loads the pending artifact into the staging table.
pub async fn run_load(settings: &Settings) -> anyhow::Result<LoadResult> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy_with(settings.database.with_db());

    let loader = StagingLoader::new(PgStagingStore::new(pool));
    let result = loader.load(&settings.artifact.pending_path()).await?;
    Ok(result)
}
