//! Prompt templates for the chat-completions classifier.

/// Placeholders: `{forms}` (one `CODE: Name` line per form), `{content}`.
pub const TEXT_CLASSIFICATION: &str = "\
You classify pages of international trade, banking and insurance documents.

Assign the page below to exactly one document type from this master list:
{forms}

Rules:
- Classify by what the page is for, not by its title. The word \"certificate\" alone decides nothing.
- Country of origin or origin criteria means a certificate of origin.
- Goods, prices and totals mean a commercial invoice.
- Cartons, dimensions and packages mean a packing list.
- Vessel, ports, shipper and consignee mean a bill of lading.
- Letterheads and addresses are not evidence.
- Pages continuing the same document get the same code.
- Answer UNKNOWN only when no type reasonably applies.

Reply with exactly one line in the form CODE|CONFIDENCE where CONFIDENCE is a number between 0 and 1.

Page content:
{content}
";

/// Placeholder: `{codes}` (comma separated candidate codes).
pub const VISION_CLASSIFICATION: &str = "\
You classify scanned pages of trade, banking and insurance documents.

Judge only the visual layout, title, logos, stamps and structure of the page image.
Pick exactly one code from: {codes}

Reply with exactly one line in the form CODE|CONFIDENCE where CONFIDENCE is a number between 0 and 1.
Reply UNKNOWN|0 when unsure.
";

pub const PAGE_ANNOTATION: &str = "\
Inspect this document page for stamps, signatures, seals and handwritten marks.
For each mark give its kind, its position on the page, any readable text inside it, and how certain you are (high, medium or low).
If the page has none, answer: No signature or stamp detected.
";

/// Reply expected from [`PAGE_TRANSCRIPTION`] for a page without text.
pub const NO_TEXT_MARKER: &str = "[NO TEXT]";

pub const PAGE_TRANSCRIPTION: &str = "\
Transcribe all printed and typed text on this document page, top to bottom, keeping line breaks.
Do not summarize, translate or comment.
If the page has no readable text, answer: [NO TEXT]
";

pub fn render_text_prompt(forms: &str, content: &str) -> String {
    TEXT_CLASSIFICATION
        .replace("{forms}", forms)
        .replace("{content}", content)
}

pub fn render_vision_prompt(codes: &[String]) -> String {
    VISION_CLASSIFICATION.replace("{codes}", &codes.join(", "))
}
