//! Token-bounded chunking of review texts.

use crate::types::TextChunk;

/// Default per-chunk ceiling, in approximate tokens.
pub const DEFAULT_MAX_TOKENS_PER_CHUNK: usize = 1000;

/// Approximate token count of a text.
///
/// CJK and other wide characters count as one token each; everything else
/// at roughly four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    let (wide, narrow) = text.chars().fold((0usize, 0usize), |(wide, narrow), c| {
        if is_wide(c) {
            (wide + 1, narrow)
        } else {
            (wide, narrow + 1)
        }
    });
    wide + narrow.div_ceil(4)
}

fn is_wide(c: char) -> bool {
    matches!(c,
        '\u{1100}'..='\u{11FF}'     // Hangul Jamo
        | '\u{2E80}'..='\u{9FFF}'   // CJK radicals, kana, unified ideographs
        | '\u{AC00}'..='\u{D7AF}'   // Hangul syllables
        | '\u{F900}'..='\u{FAFF}'   // CJK compatibility ideographs
        | '\u{FF00}'..='\u{FFEF}'   // Fullwidth forms
        | '\u{20000}'..='\u{2FA1F}' // CJK extensions
    )
}

/// Greedily packs texts into chunks that stay under a token ceiling.
///
/// Texts are never split or dropped: a text larger than the ceiling
/// becomes a chunk of its own.
#[derive(Debug, Clone, Copy)]
pub struct TokenChunker {
    max_tokens: usize,
}

impl Default for TokenChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS_PER_CHUNK)
    }
}

impl TokenChunker {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Chunk texts in order.
    pub fn chunk<S: AsRef<str>>(&self, texts: &[S]) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut current = TextChunk {
            texts: Vec::new(),
            token_count: 0,
        };

        for text in texts {
            let text = text.as_ref();
            let tokens = estimate_tokens(text);

            if !current.texts.is_empty() && current.token_count + tokens > self.max_tokens {
                chunks.push(std::mem::replace(
                    &mut current,
                    TextChunk {
                        texts: Vec::new(),
                        token_count: 0,
                    },
                ));
            }

            current.texts.push(text.to_string());
            current.token_count += tokens;
        }

        if !current.texts.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("好吃"), 2);
        assert_eq!(estimate_tokens("好吃 good"), 4);
    }

    #[test]
    fn test_packs_until_ceiling() {
        // each text is 2 tokens
        let texts = ["aaaaaaaa", "bbbbbbbb", "cccccccc"];
        let chunks = TokenChunker::new(4).chunk(&texts);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].texts, vec!["aaaaaaaa", "bbbbbbbb"]);
        assert_eq!(chunks[0].token_count, 4);
        assert_eq!(chunks[1].texts, vec!["cccccccc"]);
    }

    #[test]
    fn test_oversized_text_stands_alone() {
        let big = "x".repeat(100); // 25 tokens
        let texts = vec!["short".to_string(), big.clone(), "tail".to_string()];
        let chunks = TokenChunker::new(10).chunk(&texts);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].texts, vec!["short"]);
        assert_eq!(chunks[1].texts, vec![big]);
        assert_eq!(chunks[1].token_count, 25);
        assert_eq!(chunks[2].texts, vec!["tail"]);
    }

    #[test]
    fn test_oversized_first_text_leaves_no_empty_chunk() {
        let big = "y".repeat(80);
        let chunks = TokenChunker::new(5).chunk(&[big]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].texts.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let texts: Vec<String> = Vec::new();
        assert!(TokenChunker::default().chunk(&texts).is_empty());
    }

    proptest! {
        #[test]
        fn prop_chunks_reproduce_input(
            texts in proptest::collection::vec("[a-z好吃 ]{0,40}", 0..30),
            max_tokens in 1usize..30,
        ) {
            let chunks = TokenChunker::new(max_tokens).chunk(&texts);

            let flattened: Vec<String> = chunks.iter().flat_map(|c| c.texts.clone()).collect();
            prop_assert_eq!(flattened, texts);

            for chunk in &chunks {
                prop_assert!(!chunk.texts.is_empty());
                let sum: usize = chunk.texts.iter().map(|t| estimate_tokens(t)).sum();
                prop_assert_eq!(sum, chunk.token_count);
                prop_assert!(chunk.token_count <= max_tokens || chunk.texts.len() == 1);
            }
        }
    }
}
