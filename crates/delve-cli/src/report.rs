//! Markdown report framing.
//!
//! The result store holds the synthesis artifact verbatim; the CLI wraps
//! it with a metadata header when writing the user-facing file.

use chrono::{DateTime, Utc};

/// Render the final report: metadata header, artifact body, footer.
#[must_use]
pub fn render(query: &str, model: &str, generated_at: DateTime<Utc>, content: &str) -> String {
    let timestamp = generated_at.format("%Y-%m-%d %H:%M:%S UTC");

    format!(
        "# Research Report\n\
         \n\
         **Query:** {query}\n\
         **Generated:** {timestamp}\n\
         **Model:** {model}\n\
         \n\
         ---\n\
         \n\
         {content}\n\
         \n\
         ---\n\
         \n\
         *Generated by delve*\n"
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
