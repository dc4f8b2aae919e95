//! `.docx` report rendering.
//!
//! Reports are built in memory with `docx-rs` and handed back as bytes, so
//! concurrent requests never share an output file. A copy can optionally be
//! persisted under a unique, per-request name.

use docx_rs::{BreakType, Docx, Paragraph, Run, Style, StyleType};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// MIME type of a WordprocessingML document.
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const TITLE: &str = "Model Response";
const TITLE_STYLE: &str = "Title";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to build document: {0}")]
    Build(String),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// A rendered report ready to be streamed or saved.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub query: String,
    pub answer: String,
    /// Download filename.
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Where a persisted copy was written, if any.
    pub saved_to: Option<PathBuf>,
}

/// Renders a document with a title, the echoed query, and the answer.
pub fn render_report(query: &str, answer: &str) -> Result<Vec<u8>, ReportError> {
    let title_style = Style::new(TITLE_STYLE, StyleType::Paragraph)
        .name(TITLE_STYLE)
        .size(56)
        .bold();

    let docx = Docx::new()
        .add_style(title_style)
        .add_paragraph(
            Paragraph::new()
                .style(TITLE_STYLE)
                .add_run(Run::new().add_text(TITLE)),
        )
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!("Query: {}", query))))
        .add_paragraph(
            Paragraph::new().add_run(multiline_run(&format!("Model Answer: {}", answer))),
        );

    let mut bytes = Vec::new();
    docx.build()
        .pack(&mut Cursor::new(&mut bytes))
        .map_err(|e| ReportError::Build(e.to_string()))?;
    Ok(bytes)
}

/// Keeps model line breaks as soft breaks within one paragraph.
fn multiline_run(text: &str) -> Run {
    let mut run = Run::new();
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            run = run.add_break(BreakType::TextWrapping);
        }
        run = run.add_text(line);
    }
    run
}

/// Writes `bytes` to `<dir>/<uuid>-<filename>`, creating `dir` if needed.
pub async fn save_copy(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf, ReportError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}-{}", uuid::Uuid::new_v4().simple(), filename));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
