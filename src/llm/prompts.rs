//! Prompt constants for recognition and classification.
//!
//! These prompts are the contract between the recognizer and the vision
//! models. Classification answers are parsed by `llm::classify`, so the
//! category tokens listed in `CLASSIFY_TAXONOMY_PROMPT` must stay in sync
//! with `Category::from_token`.

use super::types::{Category, SuggestedOption};

/// Generic recognition prompt used when nothing more specific applies.
pub const DEFAULT_PROMPT: &str = "Recognize all text in this image. Preserve the original layout, \
line breaks and reading order. Output only the recognized content without commentary.";

/// Classification call 1 — one token answer.
pub const CLASSIFY_TAXONOMY_PROMPT: &str = r#"Classify the main content of this image into exactly ONE of these categories:
- document: printed text, articles, letters, book pages
- handwriting: handwritten notes or letters
- receipt: shopping receipts, invoices, bills
- id: identity documents, passports, ID cards, licenses
- table: tables, spreadsheets, tabular data
- ancient: historical or classical texts, old manuscripts, calligraphy
- artwork: paintings, illustrations, photos without meaningful text
- formula: mathematical or chemical formulas
- code: source code, terminal output
- chart: charts, graphs, diagrams
- screenshot: application or web page screenshots
- other: anything else

Answer with the category word only."#;

/// Classification call 2 — `score|rationale`.
pub fn build_confidence_prompt(category: Category) -> String {
    format!(
        "You classified this image as \"{}\". How confident are you, from 0 to 100? \
Answer in the exact format score|one-line reason, for example: 85|clear printed columns.",
        category
    )
}

/// Category-optimized recognition instruction.
pub fn prompt_for(category: Category) -> &'static str {
    match category {
        Category::Auto | Category::Other => DEFAULT_PROMPT,
        Category::Document => "Recognize all printed text in this document. Keep headings, \
paragraphs and lists in their original order and structure. Output the text only.",
        Category::Handwriting => "Transcribe the handwritten text in this image as accurately as \
possible. Keep line breaks. Mark illegible words as [illegible]. Output the transcription only.",
        Category::Receipt => "Recognize this receipt. List the merchant, date, each line item with \
quantity and price, subtotal, tax and total, one per line, in the order printed.",
        Category::Id => "Recognize the fields of this identity document. Output each field as \
`label: value` on its own line (name, document number, date of birth, expiry date, nationality, \
address). Do not invent fields that are not visible.",
        Category::Table => "Recognize the table in this image and output it as a Markdown table. \
Keep every row and column, including empty cells. Output the table only.",
        Category::Ancient => "Recognize the historical text in this image. Keep original \
characters and variant forms, preserve the line and column order (including vertical layout), \
and output the transcription only.",
        Category::PromptGen => "Describe this image as a detailed prompt for an image generation \
model: subject, composition, style, lighting, colour palette and medium, as a comma-separated list.",
        Category::Formula => "Recognize the formulas in this image and output them as LaTeX. Keep \
surrounding text as plain text.",
        Category::Code => "Recognize the source code in this image. Preserve indentation exactly \
and output the code only, without explanations.",
        Category::Chart => "Describe this chart: its type, title, axes, legend and the data values \
it shows, then summarize the main trend.",
        Category::Screenshot => "Recognize all visible text in this screenshot, grouped by screen \
region from top to bottom. Output the text only.",
    }
}

/// Categories whose output usually needs translation or modernization.
pub fn needs_language_post_processing(category: Category) -> bool {
    matches!(category, Category::Ancient | Category::Handwriting)
}

/// Follow-up actions offered for a detected category.
pub fn suggested_options(category: Category) -> Vec<SuggestedOption> {
    let options: &[(&str, &str)] = match category {
        Category::Receipt => &[("expense_summary", "Summarize expenses"), ("export_csv", "Export CSV")],
        Category::Id => &[("extract_fields", "Extract fields"), ("mask_sensitive", "Mask sensitive data")],
        Category::Table => &[("export_csv", "Export CSV"), ("export_markdown", "Export Markdown")],
        Category::Ancient => &[("modern_translation", "Modern translation"), ("annotate", "Annotate")],
        Category::Handwriting => &[("proofread", "Proofread"), ("translate", "Translate")],
        Category::PromptGen => &[("generate_prompt", "Generate prompt"), ("style_tags", "Style tags")],
        Category::Formula => &[("copy_latex", "Copy LaTeX"), ("solve", "Explain formula")],
        Category::Code => &[("copy_code", "Copy code"), ("explain_code", "Explain code")],
        Category::Chart => &[("extract_data", "Extract data"), ("summarize", "Summarize")],
        Category::Document | Category::Screenshot => &[("summarize", "Summarize"), ("translate", "Translate")],
        Category::Auto | Category::Other => &[("copy_text", "Copy text")],
    };
    options
        .iter()
        .map(|(id, label)| SuggestedOption {
            id: id.to_string(),
            label: label.to_string(),
        })
        .collect()
}
