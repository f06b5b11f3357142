//! Query expansion
//!
//! Turns one question into a bounded list of related question variants.
//! Expansion is best effort: whenever the capability is absent, slow, or
//! returns nothing usable, the variant list is exactly `[question]`.

mod gemini;

pub use gemini::GeminiProvider;

use crate::config::ExpansionConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure inside an expansion provider, absorbed into the single-question fallback
#[derive(Error, Debug)]
pub enum ExpansionError {
    #[error("Missing credential: environment variable '{0}' is not set")]
    MissingCredential(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Response(String),
}

/// Source of related questions
#[async_trait]
pub trait ExpansionProvider: Send + Sync {
    /// Related questions for `question`, at most `n`. Never empty.
    async fn expand(&self, question: &str, n: usize) -> Vec<String>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Provider used when expansion is disabled or unavailable
#[derive(Debug, Default, Clone)]
pub struct NullProvider;

#[async_trait]
impl ExpansionProvider for NullProvider {
    async fn expand(&self, question: &str, _n: usize) -> Vec<String> {
        vec![question.to_string()]
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Prompt asking the generative model for `n` related questions
pub fn build_expansion_prompt(question: &str, n: usize) -> String {
    format!(
        "Generate {n} different but related questions for the following query.\n\
         Keep them concise and relevant.\n\n\
         Original question:\n{question}\n\n\
         Return only the questions as a numbered list."
    )
}

/// Extract list items from a free-text response
///
/// A line is an item when its first non-whitespace character is a digit;
/// the item is the text after the first `.`, trimmed. Items that end up
/// empty are skipped. At most `n` items are returned.
pub fn parse_numbered_list(text: &str, n: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(|line| match line.split_once('.') {
            Some((_, rest)) => rest.trim(),
            None => line,
        })
        .filter(|item| !item.is_empty())
        .take(n)
        .map(str::to_string)
        .collect()
}

/// Bounded, never-failing query expansion
#[derive(Clone)]
pub struct QueryExpander {
    provider: Arc<dyn ExpansionProvider>,
    count: usize,
    timeout: Duration,
}

impl QueryExpander {
    pub fn new(provider: Arc<dyn ExpansionProvider>, count: usize, timeout: Duration) -> Self {
        Self {
            provider,
            count,
            timeout,
        }
    }

    /// Expander that always yields `[question]`
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullProvider), 1, Duration::from_secs(1))
    }

    /// Pick the provider from configuration and credential presence
    pub fn from_config(config: &ExpansionConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);

        if !config.enabled {
            tracing::debug!("Query expansion disabled by configuration");
            return Self::new(Arc::new(NullProvider), config.count, timeout);
        }

        match config.provider.as_str() {
            "gemini" => match GeminiProvider::from_config(config) {
                Ok(provider) => {
                    tracing::info!("Query expansion enabled via gemini ({})", config.model);
                    Self::new(Arc::new(provider), config.count, timeout)
                }
                Err(e) => {
                    tracing::info!("Query expansion unavailable, using original question only: {}", e);
                    Self::new(Arc::new(NullProvider), config.count, timeout)
                }
            },
            other => {
                tracing::warn!("Unknown expansion provider '{}', expansion disabled", other);
                Self::new(Arc::new(NullProvider), config.count, timeout)
            }
        }
    }

    /// Question variants for retrieval: non-empty, at most `count` entries
    pub async fn expand(&self, question: &str) -> Vec<String> {
        let fallback = || vec![question.to_string()];

        let mut variants =
            match tokio::time::timeout(self.timeout, self.provider.expand(question, self.count))
                .await
            {
                Ok(variants) => variants,
                Err(_) => {
                    tracing::warn!(
                        "Query expansion via {} timed out after {:?}",
                        self.provider.name(),
                        self.timeout
                    );
                    return fallback();
                }
            };

        variants.truncate(self.count);
        if variants.is_empty() {
            return fallback();
        }

        tracing::debug!("Expanded question into {} variants", variants.len());
        variants
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Provider returning a canned model response, parsed the real way
    struct ScriptedProvider {
        response: String,
    }

    #[async_trait]
    impl ExpansionProvider for ScriptedProvider {
        async fn expand(&self, question: &str, n: usize) -> Vec<String> {
            let parsed = parse_numbered_list(&self.response, n);
            if parsed.is_empty() {
                vec![question.to_string()]
            } else {
                parsed
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl ExpansionProvider for SlowProvider {
        async fn expand(&self, _question: &str, _n: usize) -> Vec<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            vec!["too late".to_string()]
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct EmptyProvider;

    #[async_trait]
    impl ExpansionProvider for EmptyProvider {
        async fn expand(&self, _question: &str, _n: usize) -> Vec<String> {
            Vec::new()
        }

        fn name(&self) -> &str {
            "empty"
        }
    }

    #[test]
    fn test_parse_numbered_list() {
        let text = "Here are some questions:\n\
                    1. What is a mammal?\n\
                    2.   Which animals are mammals?  \n\
                    \n\
                    - not numbered\n\
                    3. Are whales mammals?";

        assert_eq!(
            parse_numbered_list(text, 5),
            vec![
                "What is a mammal?",
                "Which animals are mammals?",
                "Are whales mammals?"
            ]
        );
    }

    #[test]
    fn test_parse_splits_on_first_dot_only() {
        assert_eq!(
            parse_numbered_list("1. What is v2.0 of the policy?", 5),
            vec!["What is v2.0 of the policy?"]
        );
    }

    #[test]
    fn test_parse_line_without_dot_keeps_whole_line() {
        assert_eq!(
            parse_numbered_list("  2) Which coverage applies", 5),
            vec!["2) Which coverage applies"]
        );
    }

    #[test]
    fn test_parse_bounds_and_skips_empty_items() {
        let text = "1. one\n2.\n3. three\n4. four";
        assert_eq!(parse_numbered_list(text, 2), vec!["one", "three"]);
        assert!(parse_numbered_list("no list here", 5).is_empty());
        assert!(parse_numbered_list("1. one", 0).is_empty());
    }

    #[test]
    fn test_prompt_mentions_question_and_count() {
        let prompt = build_expansion_prompt("What are mammals?", 5);
        assert!(prompt.contains("Generate 5 different"));
        assert!(prompt.contains("What are mammals?"));
        assert!(prompt.contains("numbered list"));
    }

    #[tokio::test]
    async fn test_disabled_returns_question() {
        let expander = QueryExpander::disabled();
        assert_eq!(
            expander.expand("What are mammals?").await,
            vec!["What are mammals?"]
        );
        assert_eq!(expander.provider_name(), "none");
    }

    #[tokio::test]
    async fn test_scripted_expansion_is_bounded() {
        let provider = ScriptedProvider {
            response: "1. a\n2. b\n3. c\n4. d".to_string(),
        };
        let expander = QueryExpander::new(Arc::new(provider), 3, Duration::from_secs(5));

        assert_eq!(expander.expand("q").await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_unparsable_response_falls_back() {
        let provider = ScriptedProvider {
            response: "I cannot help with that.".to_string(),
        };
        let expander = QueryExpander::new(Arc::new(provider), 5, Duration::from_secs(5));

        assert_eq!(expander.expand("original").await, vec!["original"]);
    }

    #[tokio::test]
    async fn test_empty_provider_result_falls_back() {
        let expander = QueryExpander::new(Arc::new(EmptyProvider), 5, Duration::from_secs(5));
        assert_eq!(expander.expand("original").await, vec!["original"]);
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let expander = QueryExpander::new(Arc::new(SlowProvider), 5, Duration::from_millis(50));
        assert_eq!(expander.expand("original").await, vec!["original"]);
    }

    #[tokio::test]
    async fn test_from_config_without_credential_uses_null_provider() {
        let config = ExpansionConfig {
            enabled: true,
            api_key_env: "HYBRIDRAG_TEST_UNSET_EXPANSION_KEY".to_string(),
            ..ExpansionConfig::default()
        };
        let expander = QueryExpander::from_config(&config);

        assert_eq!(expander.provider_name(), "none");
        assert_eq!(expander.expand("q").await, vec!["q"]);
    }

    #[test]
    fn test_from_config_disabled_uses_null_provider() {
        let config = ExpansionConfig {
            enabled: false,
            ..ExpansionConfig::default()
        };
        assert_eq!(QueryExpander::from_config(&config).provider_name(), "none");
    }
}
