//! Model gateway trait and the OpenAI-backed implementation.

pub mod http;

#[cfg(feature = "openai")]
pub mod openai;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::ModelSettings;
use crate::error::PalaverError;
use crate::tools::ToolDefinition;
use crate::types::{GenerationSettings, Message, MessageFragment};

/// One model call: instructions, full history and the tool catalog.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// System instructions, sent on every call and never stored in history.
    pub instructions: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub settings: GenerationSettings,
}

/// Core trait implemented by every model backend.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Provider name (e.g. "openai").
    fn provider_name(&self) -> &str;

    /// Model identifier this gateway serves.
    fn model_id(&self) -> &str;

    /// Produce one complete agent message.
    async fn invoke(&self, request: &ModelRequest) -> Result<Message, PalaverError>;

    /// Produce agent message fragments as they are generated.
    async fn stream_invoke(
        &self,
        request: &ModelRequest,
    ) -> Result<BoxStream<'static, Result<MessageFragment, PalaverError>>, PalaverError>;
}

/// Supported gateway backends.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "openai")]
    #[strum(serialize = "openai")]
    OpenAi,
    #[serde(rename = "openai-compatible")]
    #[strum(serialize = "openai-compatible")]
    OpenAiCompatible,
}

/// Create a gateway for the configured model.
#[allow(unused_variables)]
pub fn create_gateway(settings: &ModelSettings) -> Result<Box<dyn ModelGateway>, PalaverError> {
    match settings.provider {
        #[cfg(feature = "openai")]
        ProviderKind::OpenAi => {
            let api_key = settings
                .api_key
                .clone()
                .ok_or_else(|| PalaverError::Configuration("Missing OPENAI_API_KEY".into()))?;
            Ok(Box::new(openai::OpenAiGateway::new(
                settings.model.clone(),
                Some(api_key),
                settings.base_url.clone(),
            )?))
        }
        #[cfg(feature = "openai")]
        ProviderKind::OpenAiCompatible => {
            let base_url = settings.base_url.clone().ok_or_else(|| {
                PalaverError::Configuration("Missing base_url for openai-compatible provider".into())
            })?;
            Ok(Box::new(
                openai::OpenAiGateway::new(
                    settings.model.clone(),
                    settings.api_key.clone(),
                    Some(base_url),
                )?
                .with_provider_name("openai-compatible"),
            ))
        }
        #[allow(unreachable_patterns)]
        _ => Err(PalaverError::Configuration(format!(
            "Provider '{}' not enabled via feature flags",
            settings.provider
        ))),
    }
}
