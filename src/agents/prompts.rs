//! Prompt bodies for each stage. The persona preamble is added by
//! [`StageAgent::run`](super::StageAgent::run).

/// The exact reply a validator gives when the notes need no changes
pub const APPROVAL_TOKEN: &str = "APPROVED";

pub fn clean(batch: &str) -> String {
    format!(
        "Please clean and rewrite the following transcript to be readable and grammatically correct. \
         Preserve meaning.\n\nTEXT:\n{}",
        batch
    )
}

pub fn summarize_batch(cleaned: &str) -> String {
    format!(
        "Summarize this cleaned transcript batch into short bullet-point structured notes. \
         Focus on clarity, topic flow, and main ideas. Return only bullet points.\n\n{}",
        cleaned
    )
}

pub fn merge(batch_summaries: &str) -> String {
    format!(
        "Combine these batch-level summaries into well-structured lecture-style notes.\n\
         STRICT FORMAT:\n\
         - Use Markdown headings (#, ##, ###)\n\
         - Use bullet points\n\
         - Include key takeaways and a one-line summary\n\n{}",
        batch_summaries
    )
}

pub fn validate(notes: &str) -> String {
    format!(
        "If the notes are complete, coherent and well-structured, reply exactly: {}. \
         Otherwise, give 2-3 short bullet points with improvement suggestions.\n\n{}",
        APPROVAL_TOKEN, notes
    )
}

pub fn translate(notes: &str, target_language: &str) -> String {
    format!(
        "Translate the following text into {}. Preserve meaning and formatting. \
         Keep headings, paragraphs and bullet points intact.\n\nTEXT:\n{}",
        target_language, notes
    )
}

pub fn answer(notes: &str, question: &str) -> String {
    format!(
        "Here are lecture notes:\n\n{}\n\nQUESTION:\n{}\n\n\
         Answer concisely and reference the relevant headings.",
        notes, question
    )
}
