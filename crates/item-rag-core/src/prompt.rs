//! Prompt template for grounded generation.
//!
//! Document contents are interpolated verbatim. There is no escaping, so a
//! record description can steer the model; only use with trusted data.

use crate::models::RetrievedDocument;

const HEADER: &str = "Given the following documents, answer the query:";

/// Renders the generation prompt: the fixed header, one line per document
/// in the given order, then the query as a question.
pub fn assemble_prompt<'a, I>(query: &str, documents: I) -> String
where
    I: IntoIterator<Item = &'a RetrievedDocument>,
{
    let mut prompt = String::from(HEADER);
    prompt.push('\n');
    for document in documents {
        prompt.push_str("    ");
        prompt.push_str(&document.content);
        prompt.push('\n');
    }
    prompt.push('\n');
    prompt.push_str("Question: ");
    prompt.push_str(query);
    prompt.push('?');
    prompt
}
