// Prompt text for the reflow call.

/// The reply is prefilled with `{`, so the model only has to continue the object.
pub const REFLOW_SYSTEM: &str = "\
You are a text formatter. You take raw text extracted from a PDF and reflow it \
into clean lines for handwritten notes.\n\
\n\
Respond with valid JSON only: {\"lines\": [\"...\", \"...\"]}\n\
Do NOT use markdown code fences. \
Do NOT include any text, explanation or apology outside the JSON object.";

/// Instruction that keeps the model from rewriting the user's text.
pub const PRESERVE_CONTENT_INSTRUCTION: &str = "\
    CRITICAL: Do not lose any content. Do not summarize, paraphrase, translate \
    or correct the text. Only change where lines break.";

pub const REFLOW_PROMPT_TEMPLATE: &str = "\
Reflow the text below into a list of clean lines.\n\
\n\
RULES:\n\
1. Each line should be {min_chars}–{max_chars} characters long\n\
2. Keep math equations, bullets, headings and definitions\n\
3. Put every heading on its own line\n\
4. Break long paragraphs into multiple lines\n\
5. {preserve}\n\
\n\
TEXT:\n\
{raw_text}\n\
\n\
Return JSON only: {\"lines\": [\"Heading Text\", \"Line 1 of content...\", \"Line 2 of content...\"]}";
