//! LLM prompts for review summarization and question answering.
//!
//! Every prompt restricts the model to the supplied review content.

/// System prompt for every call.
pub const ANALYST_SYSTEM_PROMPT: &str = r#"You are an assistant that analyzes consumer reviews of a single place.

Rules:
- Use ONLY the review content provided in the user message.
- Never add facts from background knowledge, the web, or other places.
- If the reviews do not contain the answer, say so plainly.
- Reply in the language of the user's question (default: Traditional Chinese)."#;

/// Prompt for condensing one chunk of reviews.
pub const CHUNK_SUMMARY_PROMPT: &str = r#"Condense the following consumer reviews into a summary of at most {limit} words.
Keep recurring praise, recurring complaints, and concrete details (dishes, prices, service, wait times).

Reviews:
{reviews}"#;

/// Prompt for merging chunk summaries into one.
pub const COMBINE_SUMMARIES_PROMPT: &str = r#"Below are several summaries of consumer reviews for the same place.
Merge them into one final summary of at most {limit} words. Do not introduce anything that is not in the summaries.

Summaries:
{summaries}"#;

/// Prompt for answering from the combined summary.
pub const ANSWER_FROM_SUMMARY_PROMPT: &str = r#"Here is a summary of the place's consumer reviews:
{summary}

Answer the user's question using only this summary.

Question: {question}"#;

/// Prompt for answering from the raw reviews when they fit in one request.
pub const ANSWER_FROM_REVIEWS_PROMPT: &str = r#"Here are the place's consumer reviews, one per line:
{reviews}

Answer the user's question using only these reviews.

Question: {question}"#;

/// Fill `{name}` placeholders in a single pass.
///
/// Substituted values are never rescanned, so review text containing a
/// placeholder is left as written.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values
            .iter()
            .find(|(name, _)| tail.starts_with(name) && tail[name.len()..].starts_with('}'));
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Format the chunk summary prompt.
pub fn format_chunk_summary_prompt(reviews: &str, limit: u32) -> String {
    let limit = limit.to_string();
    fill(
        CHUNK_SUMMARY_PROMPT,
        &[("limit", limit.as_str()), ("reviews", reviews)],
    )
}

/// Format the combine prompt; summaries are separated by blank lines.
pub fn format_combine_prompt(summaries: &[String], limit: u32) -> String {
    let limit = limit.to_string();
    let summaries = summaries.join("\n\n");
    fill(
        COMBINE_SUMMARIES_PROMPT,
        &[("limit", limit.as_str()), ("summaries", summaries.as_str())],
    )
}

pub fn format_answer_from_summary_prompt(summary: &str, question: &str) -> String {
    fill(
        ANSWER_FROM_SUMMARY_PROMPT,
        &[("summary", summary), ("question", question)],
    )
}

pub fn format_answer_from_reviews_prompt(reviews: &str, question: &str) -> String {
    fill(
        ANSWER_FROM_REVIEWS_PROMPT,
        &[("reviews", reviews), ("question", question)],
    )
}
