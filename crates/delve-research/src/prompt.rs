//! Research input composition.
//!
//! Turns a [`ResearchRequest`](crate::ResearchRequest) into the text handed
//! to the synthesis engine: the query itself, optional background context,
//! a source-focus instruction, format preference, and the standing
//! requirements list. Also carries the instruction sheet for the optional
//! prompt-enhancement pass.

use crate::researcher::ResearchRequest;

/// Instruction sheet for the prompt-enhancement pass.
///
/// The enhancement model is asked to turn the user's task into researcher
/// instructions rather than answering it directly.
pub const ENHANCEMENT_INSTRUCTIONS: &str = "\
You will be given a research task by a user. Your job is to produce a set of
instructions for a researcher that will complete the task. Do NOT complete the
task yourself, just provide instructions on how to complete it.

GUIDELINES:
1. **Maximize Specificity and Detail**
- Include all known user preferences and explicitly list key attributes or
  dimensions to consider.
- It is of utmost importance that all details from the user are included in
  the instructions.

2. **Fill in Unstated But Necessary Dimensions as Open-Ended**
- If certain attributes are essential for a meaningful output but the user
  has not provided them, explicitly state that they are open-ended or default
  to no specific constraint.

3. **Avoid Unwarranted Assumptions**
- If the user has not provided a particular detail, do not invent one.
- Instead, state the lack of specification and guide the researcher to treat
  it as flexible or accept all possible options.

4. **Use the First Person**
- Phrase the request from the perspective of the user.

5. **Structure and Organization**
- If you determine that including tables, charts, or structured sections will help
  organize the information, explicitly request that the researcher provide them.
- Ask for clear headers and formatting that ensures clarity and structure.

6. **Source Requirements**
- Be specific about source prioritization based on the user's focus area.
- For academic queries, prefer peer-reviewed research and official publications.
- For business analysis, prioritize industry reports, financial data, and market research.
- For current events, focus on reliable news sources and official statements.
- Always request inline citations and source metadata.

7. **Analysis Depth**
- Be analytical and avoid generalities.
- Request specific figures, trends, statistics, and measurable outcomes.
- Ensure each section supports data-backed reasoning.";

/// Source-focus instruction for a known focus keyword, or a generic
/// instruction wrapping a custom focus description.
fn focus_instruction(focus: &str) -> String {
    match focus.to_lowercase().as_str() {
        "academic" => "Prioritize peer-reviewed research, academic papers, official \
                       publications, and scholarly sources."
            .to_owned(),
        "business" => "Focus on industry reports, market research, financial data, \
                       company reports, and business analytics."
            .to_owned(),
        "news" => "Emphasize recent news articles, press releases, official \
                   statements, and current events coverage."
            .to_owned(),
        "reports" => "Concentrate on official reports, government documents, white \
                      papers, and institutional publications."
            .to_owned(),
        "technical" => "Focus on technical documentation, specifications, standards, \
                        and expert technical sources."
            .to_owned(),
        _ => format!("Prioritize sources related to: {focus}. Include inline citations."),
    }
}

/// Compose the full research input for the synthesis engine.
pub fn compose_input(request: &ResearchRequest) -> String {
    let mut parts = vec![format!("Research Query: {}", request.query)];

    if let Some(context) = &request.options.context {
        parts.push(format!("Background Context: {context}"));
    }

    let source_instruction = request.options.focus.as_deref().map_or_else(
        || "Include reliable, up-to-date sources with inline citations.".to_owned(),
        focus_instruction,
    );
    parts.push(format!("Source Requirements: {source_instruction}"));

    if let Some(format) = &request.options.format {
        parts.push(format!("Output Format: {format}"));
    }

    for (key, value) in &request.options.extra {
        parts.push(format!("{key}: {value}"));
    }

    parts.push(
        "Requirements:\n\
         - Include specific figures, trends, statistics, and measurable outcomes\n\
         - Provide inline citations and return all source metadata\n\
         - Be analytical and avoid generalities\n\
         - Use clear, professional language\n\
         - Structure information with appropriate headers and formatting"
            .to_owned(),
    );

    parts.join("\n\n")
}

/// Compose the input for the prompt-enhancement pass: the raw task
/// restated with whatever the caller provided, for the enhancement model
/// to expand into researcher instructions.
pub fn compose_enhancement_input(request: &ResearchRequest) -> String {
    let mut parts = vec![format!("Research Query: {}", request.query)];

    if let Some(context) = &request.options.context {
        parts.push(format!("Background Context: {context}"));
    }
    if let Some(focus) = &request.options.focus {
        parts.push(format!("Source Focus: {focus}"));
    }
    if let Some(format) = &request.options.format {
        parts.push(format!("Preferred Output Format: {format}"));
    }

    parts.join("\n\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
