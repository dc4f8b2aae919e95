//! `item-rag ask`: run the query-to-report pipeline from the command line.
//!
//! Uses the same store, generator, and pipeline as
//! `GET /generate_docx_from_query/`, then writes the `.docx` to disk.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db;
use crate::generation::ChatCompletionsGenerator;
use crate::migrate;
use crate::pipeline::{self, PipelineError};
use crate::sqlite_store::SqliteItemStore;

/// CLI entry point. Writes the report to `output`, or to `report.filename`
/// in the working directory when no path is given. Fails when no item
/// matches, mirroring the endpoint's 404.
pub async fn run_ask(config: &Config, word: &str, output: Option<&Path>) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let store = SqliteItemStore::new(pool);
    let generator = ChatCompletionsGenerator::new(&config.generation)?;

    let result = pipeline::answer_query(&store, &generator, config, word).await;
    store.pool().close().await;

    let report = match result {
        Ok(report) => report,
        Err(PipelineError::NoMatches) => {
            bail!("No items found with '{}' in their description", word.trim())
        }
        Err(e) => return Err(e.into()),
    };

    let path: PathBuf = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&report.filename));
    std::fs::write(&path, &report.bytes)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;

    println!("query:  {}", report.query);
    println!("answer: {}", report.answer);
    println!("report: {}", path.display());
    if let Some(saved) = &report.saved_to {
        println!("copy:   {}", saved.display());
    }

    Ok(())
}
