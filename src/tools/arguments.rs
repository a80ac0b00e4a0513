//! Typed access to tool call arguments.

use crate::error::PalaverError;

/// Arguments of one tool call, already validated against the tool's schema.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, PalaverError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| PalaverError::InvalidInput(format!("missing integer argument: {key}")))
    }

    /// Deserialize the whole argument object into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, PalaverError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            PalaverError::InvalidInput(format!("invalid tool arguments: {e}"))
        })
    }
}
