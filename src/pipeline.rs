//! Query-to-report pipeline.
//!
//! Shared by `GET /generate_docx_from_query/` and `item-rag ask`:
//!
//! 1. Case-insensitive substring search over item descriptions
//!    (at most `server.page_size` items).
//! 2. Build a fresh [`Bm25Index`] over the matches and rank them.
//! 3. Assemble the prompt from the top `retrieval.top_k` documents.
//! 4. Generate an answer.
//! 5. Render the `.docx` report (and optionally save a copy).
//!
//! All state is local to one call.

use thiserror::Error;
use tracing::{debug, info};

use item_rag_core::index::Bm25Index;
use item_rag_core::models::{ItemField, RetrievedDocument};
use item_rag_core::prompt::assemble_prompt;
use item_rag_core::store::{ItemStore, StoreError};

use crate::config::Config;
use crate::generation::{GenerationError, Generator};
use crate::report::{self, GeneratedReport, ReportError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("No items found with the given word in description")]
    NoMatches,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Runs the full pipeline for `word`.
pub async fn answer_query(
    store: &dyn ItemStore,
    generator: &dyn Generator,
    config: &Config,
    word: &str,
) -> Result<GeneratedReport, PipelineError> {
    let word = word.trim();
    if word.is_empty() {
        return Err(PipelineError::EmptyQuery);
    }

    let items = store
        .find_by_substring(ItemField::Description, word, true, config.server.page_size)
        .await?;
    if items.is_empty() {
        return Err(PipelineError::NoMatches);
    }
    debug!(query = word, matches = items.len(), "store search complete");

    let mut index = Bm25Index::new(config.retrieval.bm25_params());
    index.index(items.iter().map(RetrievedDocument::from));
    let ranked = index.rank(word, config.retrieval.top_k);

    let prompt = assemble_prompt(word, ranked.iter().map(|s| &s.document));
    debug!(
        documents = ranked.len(),
        prompt_chars = prompt.len(),
        "prompt assembled"
    );

    let answer = generator.generate(&prompt).await?;
    info!(
        query = word,
        model = generator.model_name(),
        answer_chars = answer.len(),
        "generation complete"
    );

    let bytes = report::render_report(word, &answer)?;
    let filename = config.report.filename.clone();
    let saved_to = match &config.report.output_dir {
        Some(dir) => {
            let path = report::save_copy(dir, &filename, &bytes).await?;
            info!(path = %path.display(), "report saved");
            Some(path)
        }
        None => None,
    };

    Ok(GeneratedReport {
        query: word.to_string(),
        answer,
        filename,
        bytes,
        saved_to,
    })
}
