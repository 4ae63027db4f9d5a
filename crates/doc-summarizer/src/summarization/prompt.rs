//! Prompt templates for document summaries

/// Prompt builder for summarization calls
pub struct PromptBuilder;

impl PromptBuilder {
    /// Prompt for a document that fits in a single call
    pub fn build_summary_prompt(filename: &str, text: &str) -> String {
        format!(
            r#"You are summarizing a PDF document for a reader who has not seen it.

RULES:
1. Use ONLY information stated in the document text below
2. Do not add opinions, outside knowledge or speculation
3. Keep names, figures and dates exactly as written
4. If the text is fragmented or unreadable, say so instead of guessing

FORMAT:
- Start with a one-sentence overview of what the document is
- Follow with the key points as a short bulleted list
- End with any conclusions, decisions or action items the document states

DOCUMENT: {filename}

TEXT:
{text}

SUMMARY:"#,
            filename = filename,
            text = text,
        )
    }

    /// Prompt for one section of a long document
    pub fn build_section_prompt(filename: &str, index: usize, total: usize, text: &str) -> String {
        format!(
            r#"You are summarizing part {index} of {total} of the PDF document "{filename}".

Write a dense summary of this part only, in at most 8 bullet points.
Use ONLY information stated in the text. Keep names, figures and dates exactly as written.

TEXT OF PART {index}:
{text}

SUMMARY OF PART {index}:"#,
            filename = filename,
            index = index,
            total = total,
            text = text,
        )
    }

    /// Prompt that merges section summaries into the final summary
    pub fn build_combine_prompt(filename: &str, section_summaries: &[String]) -> String {
        let sections = section_summaries
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[Part {}]\n{}", i + 1, s.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"The PDF document "{filename}" was summarized in {count} parts. Combine the part summaries below into one summary of the whole document.

RULES:
1. Use ONLY information from the part summaries
2. Merge repeated points and keep the document's order
3. Keep names, figures and dates exactly as written

FORMAT:
- Start with a one-sentence overview of what the document is
- Follow with the key points as a short bulleted list
- End with any conclusions, decisions or action items the document states

PART SUMMARIES:
{sections}

SUMMARY:"#,
            filename = filename,
            count = section_summaries.len(),
            sections = sections,
        )
    }
}
