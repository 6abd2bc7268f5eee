// src/context.rs
// Citation-numbered context block built from retrieved articles

use crate::retrieval::RetrievedDocument;

/// Articles included in a prompt
pub const MAX_CONTEXT_DOCUMENTS: usize = 3;

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}

/// Format the most relevant documents as numbered article blocks separated
/// by blank lines. Output depends only on the input order and contents.
pub fn assemble_context(documents: &[RetrievedDocument]) -> String {
    documents
        .iter()
        .take(MAX_CONTEXT_DOCUMENTS)
        .enumerate()
        .map(|(index, retrieved)| {
            let doc = &retrieved.document;
            format!(
                "Article {}: {}\nContent: {}\nSource: {}\nPublished: {}",
                index + 1,
                or_default(&doc.title, "News Article"),
                doc.content,
                or_default(&doc.url, "Unknown"),
                or_default(&doc.published_date, "Unknown"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
