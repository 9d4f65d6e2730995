//! Lifecycle payload types.
//!
//! Field names on the wire follow the orchestrator's convention (PascalCase)
//! and are part of the contract.

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One structured data record flowing through the pipeline. The shape is
/// expected to match a previously discovered [`ShapeDefinition`], but the
/// subscriber does not validate it.
pub type DataPoint = serde_json::Map<String, serde_json::Value>;

/// Setting key holding the sink file path.
pub const FILE_SETTING: &str = "file";

/// Opaque configuration mapping supplied once at `Init`.
///
/// Only the `"file"` key is interpreted by the subscriber core; everything
/// else is carried for connector-specific use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(HashMap<String, serde_json::Value>);

impl Settings {
    pub fn new(values: HashMap<String, serde_json::Value>) -> Self {
        Self(values)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Resolve the configured sink path.
    ///
    /// Absent key or empty string means persistence is disabled (`Ok(None)`).
    /// A present but non-string value is a configuration error.
    pub fn file_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        match self.0.get(FILE_SETTING) {
            None => Ok(None),
            Some(serde_json::Value::String(path)) if path.is_empty() => Ok(None),
            Some(serde_json::Value::String(path)) => Ok(Some(PathBuf::from(path))),
            Some(other) => Err(SettingsError::NotAString {
                key: FILE_SETTING,
                found: json_type_name(other),
            }),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A named schema describing the records a subscriber accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShapeDefinition {
    pub name: String,
    pub description: String,
    /// Names of the properties forming the primary key. Non-empty.
    pub keys: Vec<String>,
    pub properties: Vec<PropertyDefinition>,
}

/// One typed property of a shape. `Type` is a free-form tag
/// (e.g. "number", "string") and is not validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(rename = "Type")]
    pub data_type: String,
}

// ============================================================================
// Lifecycle requests and responses
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitRequest {
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitResponse {
    pub success: bool,
    pub message: String,
}

/// Request body is implementation-defined and unused by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestConnectionRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
}

/// Request body is implementation-defined and unused by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoverShapesRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiscoverShapesResponse {
    pub shapes: Vec<ShapeDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiveDataPointRequest {
    #[serde(default)]
    pub data_point: DataPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiveDataPointResponse {
    pub success: bool,
}

/// Request body is implementation-defined and unused by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisposeRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisposeResponse {
    pub success: bool,
}

/// Body of an `OpCode::Err` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorPayload {
    pub message: String,
}
