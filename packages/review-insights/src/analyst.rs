//! Question answering grounded in a review set.
//!
//! When all review texts fit in one chunk the question is answered against
//! them directly. Otherwise each chunk is summarized, the summaries are
//! merged, and the question is answered against the merged summary. Calls
//! run one after another through the shared rate limiter.

use openai_client::{ChatRequest, Message};
use tracing::{debug, info, warn};

use crate::chunking::{TokenChunker, DEFAULT_MAX_TOKENS_PER_CHUNK};
use crate::error::{Result, ReviewError};
use crate::invoker::{ChatModel, Completion, ModelInvoker};
use crate::prompts::{
    format_answer_from_reviews_prompt, format_answer_from_summary_prompt,
    format_chunk_summary_prompt, format_combine_prompt, ANALYST_SYSTEM_PROMPT,
};
use crate::types::{Answer, ReviewRecord};

/// Default model on OpenRouter.
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528:free";

/// Model and budget settings for answering.
#[derive(Debug, Clone)]
pub struct AnswerConfig {
    pub model: String,

    /// Token ceiling per review chunk
    pub max_tokens_per_chunk: usize,

    /// Output cap for each chunk summary
    pub summary_max_tokens: u32,

    /// Output cap for the merged summary
    pub combined_max_tokens: u32,

    /// Output cap for the final answer
    pub answer_max_tokens: u32,

    pub summary_temperature: f32,
    pub answer_temperature: f32,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens_per_chunk: DEFAULT_MAX_TOKENS_PER_CHUNK,
            summary_max_tokens: 200,
            combined_max_tokens: 300,
            answer_max_tokens: 500,
            summary_temperature: 0.3,
            answer_temperature: 0.5,
        }
    }
}

/// Answers free-form questions about a review set.
pub struct ReviewAnalyst<M> {
    invoker: ModelInvoker<M>,
    chunker: TokenChunker,
    config: AnswerConfig,
}

impl<M: ChatModel> ReviewAnalyst<M> {
    pub fn new(invoker: ModelInvoker<M>, config: AnswerConfig) -> Self {
        Self {
            invoker,
            chunker: TokenChunker::new(config.max_tokens_per_chunk),
            config,
        }
    }

    pub fn invoker(&self) -> &ModelInvoker<M> {
        &self.invoker
    }

    /// Answer `question` from `records` only.
    ///
    /// A truncated final answer comes back with the truncation marker
    /// appended and `truncated` set.
    pub async fn answer_question(&self, records: &[ReviewRecord], question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ReviewError::Validation("question must not be empty".into()));
        }
        if records.is_empty() {
            return Err(ReviewError::Validation(
                "cannot answer a question without reviews".into(),
            ));
        }

        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let chunks = self.chunker.chunk(&texts);
        info!(
            reviews = records.len(),
            chunks = chunks.len(),
            "Answering question from reviews"
        );

        let prompt = if chunks.len() <= 1 {
            format_answer_from_reviews_prompt(&texts.join("\n"), question)
        } else {
            let mut summaries = Vec::with_capacity(chunks.len());
            for (index, chunk) in chunks.iter().enumerate() {
                debug!(chunk = index + 1, tokens = chunk.token_count, "Summarizing chunk");
                let summary = self
                    .call(
                        format_chunk_summary_prompt(&chunk.joined(), self.config.summary_max_tokens),
                        self.config.summary_max_tokens,
                        self.config.summary_temperature,
                    )
                    .await?;
                summaries.push(intermediate_text(summary, "chunk summary"));
            }

            let combined = self
                .call(
                    format_combine_prompt(&summaries, self.config.combined_max_tokens),
                    self.config.combined_max_tokens,
                    self.config.summary_temperature,
                )
                .await?;
            format_answer_from_summary_prompt(&intermediate_text(combined, "combined summary"), question)
        };

        let completion = self
            .call(prompt, self.config.answer_max_tokens, self.config.answer_temperature)
            .await?;
        let truncated = completion.truncated;

        Ok(Answer {
            text: completion.into_marked_text(),
            truncated,
        })
    }

    async fn call(&self, prompt: String, max_tokens: u32, temperature: f32) -> Result<Completion> {
        let request = ChatRequest::new(&self.config.model)
            .message(Message::system(ANALYST_SYSTEM_PROMPT))
            .message(Message::user(prompt))
            .temperature(temperature)
            .max_output_tokens(max_tokens);
        self.invoker.invoke(request).await
    }
}

fn intermediate_text(completion: Completion, stage: &str) -> String {
    if completion.truncated {
        warn!(stage, "Intermediate summary hit the length limit, using it as is");
    }
    completion.text
}
