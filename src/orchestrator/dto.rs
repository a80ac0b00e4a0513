//! Transport-agnostic request and response shapes.

use serde::{Deserialize, Serialize};

use crate::error::PalaverError;
use crate::types::{ContentPart, ImageDetail, Message, MessageContent, Role};

/// Synchronous turn request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub thread_id: String,
    pub content: Vec<InboundPart>,
}

impl ChatRequest {
    pub fn text(thread_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            content: vec![InboundPart::Text { text: text.into() }],
        }
    }
}

/// One inbound content part. Unknown `type` values deserialize to `Unsupported`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundPart {
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(alias = "image")]
    ImageUrl {
        #[serde(rename = "imageUrl", alias = "image_url", alias = "imageRef")]
        image_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<ImageDetail>,
    },
    #[serde(other)]
    Unsupported,
}

/// Streaming turn request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub thread_id: String,
    pub content: String,
}

/// A message as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            role: message.role,
            content: message.content.clone(),
        }
    }
}

pub(crate) fn validate_thread_id(thread_id: &str) -> Result<(), PalaverError> {
    if thread_id.trim().is_empty() {
        return Err(PalaverError::InvalidInput("threadId must not be empty".into()));
    }
    Ok(())
}

/// Convert inbound parts into content for a single human message.
pub(crate) fn to_content_parts(parts: &[InboundPart]) -> Result<Vec<ContentPart>, PalaverError> {
    if parts.is_empty() {
        return Err(PalaverError::InvalidInput("content must not be empty".into()));
    }
    parts
        .iter()
        .map(|part| match part {
            InboundPart::Text { text } if !text.is_empty() => {
                Ok(ContentPart::Text { text: text.clone() })
            }
            InboundPart::Text { .. } => {
                Err(PalaverError::InvalidInput("text part must not be empty".into()))
            }
            InboundPart::ImageUrl { image_url, detail } if !image_url.is_empty() => {
                Ok(ContentPart::ImageUrl {
                    image_url: image_url.clone(),
                    detail: *detail,
                })
            }
            InboundPart::ImageUrl { .. } => {
                Err(PalaverError::InvalidInput("image part must carry a url".into()))
            }
            InboundPart::Unsupported => {
                Err(PalaverError::InvalidInput("Unsupported content type".into()))
            }
        })
        .collect()
}
