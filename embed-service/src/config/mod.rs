pub mod default_config;
pub mod encoder_model_config;
pub mod encoder_provider;
