use crate::config::encoder_provider::EncoderProvider;

/// Configuration for an embedding model endpoint.
///
/// # Fields
///
/// - `provider`: Which backend serves the model.
/// - `model`: Model identifier (e.g., `"nomic-embed-text"`).
/// - `endpoint`: Base URL of the server (without the API path).
/// - `api_key`: Optional API key for providers that require authentication.
/// - `timeout_secs`: Optional request timeout in seconds.
///
/// # Examples
///
/// ```
/// use embed_service::config::encoder_model_config::EncoderModelConfig;
/// use embed_service::config::encoder_provider::EncoderProvider;
///
/// let cfg = EncoderModelConfig {
///     provider: EncoderProvider::Ollama,
///     model: "nomic-embed-text".to_string(),
///     endpoint: "http://localhost:11434".to_string(),
///     api_key: None,
///     timeout_secs: Some(30),
/// };
/// assert_eq!(cfg.provider.as_str(), "ollama");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderModelConfig {
    /// The embedding backend.
    pub provider: EncoderProvider,

    /// Model identifier string.
    pub model: String,

    /// Inference endpoint (local server or remote API base URL).
    pub endpoint: String,

    /// Optional API key for authentication (e.g., OpenAI).
    pub api_key: Option<String>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}
