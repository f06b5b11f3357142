use crate::config::Config;
use crate::error::{RagError, Result, ValidationError};

/// Upper bound on requested question variants
const MAX_EXPANSION_COUNT: usize = 20;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every violation
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_paths(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_expansion(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RagError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_paths(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when the corpus and index are opened
        if config.corpus.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "corpus.path",
                "Corpus path cannot be empty",
            ));
        }

        if config.index.vector_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "index.vector_path",
                "Vector index path cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.embedding.provider;
        let valid_providers = ["fastembed", "hash"];
        if !valid_providers.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    valid_providers, provider
                ),
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }
    }

    fn validate_expansion(config: &Config, errors: &mut Vec<ValidationError>) {
        // A missing credential is not an error: expansion falls back to the question
        let count = config.expansion.count;
        if count == 0 || count > MAX_EXPANSION_COUNT {
            errors.push(ValidationError::new(
                "expansion.count",
                format!(
                    "Count must be between 1 and {}, got {}",
                    MAX_EXPANSION_COUNT, count
                ),
            ));
        }

        if config.expansion.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "expansion.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }

        let provider = &config.expansion.provider;
        if provider != "gemini" {
            errors.push(ValidationError::new(
                "expansion.provider",
                format!("Provider must be 'gemini', got '{}'", provider),
            ));
        }

        if config.expansion.enabled && config.expansion.api_key_env.is_empty() {
            errors.push(ValidationError::new(
                "expansion.api_key_env",
                "API key environment variable name cannot be empty",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_empty_corpus_path() {
        let mut config = Config::default();
        config.corpus.path = PathBuf::new();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_zero_top_k() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_every_violation() {
        let mut config = Config::default();
        config.embedding.provider = "word2vec".to_string();
        config.expansion.count = 0;
        config.expansion.timeout_secs = 0;

        match ConfigValidator::validate(&config) {
            Err(RagError::ConfigValidation { errors }) => {
                let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
                assert_eq!(
                    paths,
                    vec![
                        "embedding.provider",
                        "expansion.count",
                        "expansion.timeout_secs"
                    ]
                );
            }
            other => panic!("expected ConfigValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_credential_is_not_a_violation() {
        let mut config = Config::default();
        config.expansion.api_key_env = "HYBRIDRAG_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());
    }
}
