use std::str::FromStr;

use crate::error_handler::ConfigError;

/// Represents the backend used to compute text embeddings.
///
/// Adding more providers later (e.g., a local ONNX runtime behind HTTP) is
/// done by extending this enum and [`crate::EmbeddingService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderProvider {
    /// Local Ollama runtime (`/api/embeddings`).
    Ollama,
    /// OpenAI or any server exposing the same `/v1/embeddings` contract.
    OpenAi,
}

impl EncoderProvider {
    /// Stable lowercase name, as accepted by `EMBEDDING_PROVIDER`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderProvider::Ollama => "ollama",
            EncoderProvider::OpenAi => "openai",
        }
    }
}

impl FromStr for EncoderProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(EncoderProvider::Ollama),
            "openai" | "open_ai" | "openai-compatible" => Ok(EncoderProvider::OpenAi),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("Ollama".parse::<EncoderProvider>().unwrap(), EncoderProvider::Ollama);
        assert_eq!(" openai ".parse::<EncoderProvider>().unwrap(), EncoderProvider::OpenAi);
        assert!("bert".parse::<EncoderProvider>().is_err());
    }
}
