use anyhow::{Context, Result};
use dexsync_fetch::{BatchSummary, Engine, FetchResult, HttpClient, ReqwestClient, ValidatorStore};
use dexsync_store::SledStore;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Stage};
use crate::config::AppConfig;
use crate::progress::BatchTrackerBuilder;

pub struct CommandExecutor {
    config: AppConfig,
    quiet:  bool,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, quiet: bool) -> Self { Self { config, quiet } }

    /// Run `stages` in order against the persistent store.
    pub async fn sync(&self, stages: &[Stage]) -> Result<BatchSummary> {
        let store = SledStore::open(&self.config.store_path).with_context(|| {
            format!("Failed to open validator store {}", self.config.store_path.display())
        })?;
        let client = ReqwestClient::from_options(&self.config.engine_options())?;

        let mut total = BatchSummary::default();
        for &stage in stages {
            let summary = self.run_stage(&client, &store, stage).await?;
            total.changed += summary.changed;
            total.unchanged += summary.unchanged;
            total.failed += summary.failed;
        }

        store.flush().context("Failed to flush validator store")?;
        info!(summary = %total, "sync finished");
        Ok(total)
    }

    /// Fetch one stage's batch, shown on a progress bar.
    pub async fn run_stage<C, S>(&self, client: &C, store: &S, stage: Stage) -> Result<BatchSummary>
    where
        C: HttpClient,
        S: ValidatorStore,
    {
        let targets = Catalog::new(&self.config).targets(stage)?;
        info!(%stage, count = targets.len(), "refreshing");

        let tracker = BatchTrackerBuilder::default()
            .with_len(targets.len())
            .with_prefix(stage.name())
            .hidden(self.quiet)
            .build();
        let bar = tracker.clone();
        let options = self
            .config
            .engine_options()
            .accept(stage.accept())
            .on_progress(move |progress| bar.update(progress));

        let engine = Engine::new(client, store, &self.config.data_dir).with_options(options);
        let results = engine.fetch_batch(targets).await;
        tracker.finish();

        report(stage, &results);
        Ok(BatchSummary::from_results(&results))
    }

    /// Print every stored validator record.
    pub fn list_store(&self) -> Result<usize> {
        let store = SledStore::open(&self.config.store_path).with_context(|| {
            format!("Failed to open validator store {}", self.config.store_path.display())
        })?;

        let records = store.records()?;
        for record in &records {
            println!(
                "{}\tetag={}\tlast-modified={}",
                record.uri,
                record.etag.as_deref().unwrap_or("-"),
                record.last_modified.as_deref().unwrap_or("-")
            );
        }
        Ok(records.len())
    }

    pub fn show_config(&self) -> Result<()> {
        println!("{}", self.config.show()?);
        Ok(())
    }
}

fn report(stage: Stage, results: &[FetchResult]) {
    for result in results {
        if result.is_success() {
            debug!(index = result.index, "{result}");
        } else {
            warn!(index = result.index, "{result}");
        }
    }

    let summary = BatchSummary::from_results(results);
    info!(%stage, %summary, "stage finished");
}
