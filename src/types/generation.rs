//! Sampling settings forwarded to the model gateway.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Settings controlling text generation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stop_sequences: Option<Vec<String>>,
    pub seed: Option<u64>,
    /// End-user identifier forwarded to providers that accept one.
    pub user: Option<String>,
}
