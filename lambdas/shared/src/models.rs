//! Domain models for the custom resources
//!
//! These types represent the two ends of every invocation:
//! - Lifecycle events: what CloudFormation sends to the Lambda
//! - Response envelopes: what the Lambda PUTs back to the pre-signed URL
//! - Outcomes: what a handler produces in between

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Error, Result};

/// Lifecycle verb carried in `RequestType`
///
/// Unknown verbs are kept verbatim so the failure report can name them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestType {
    Create,
    Update,
    Delete,
    Other(String),
}

impl From<String> for RequestType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Create" => RequestType::Create,
            "Update" => RequestType::Update,
            "Delete" => RequestType::Delete,
            _ => RequestType::Other(value),
        }
    }
}

impl From<RequestType> for String {
    fn from(value: RequestType) -> Self {
        value.as_str().to_string()
    }
}

impl RequestType {
    pub fn as_str(&self) -> &str {
        match self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
            RequestType::Delete => "Delete",
            RequestType::Other(verb) => verb,
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Custom resource request delivered by CloudFormation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEvent {
    pub request_type: RequestType,
    #[serde(default)]
    pub resource_properties: ResourceProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<ResourceProperties>,
    #[serde(default)]
    pub stack_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub logical_resource_id: String,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    /// Present on Update and Delete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

impl LifecycleEvent {
    /// Best-effort read of a request that failed to deserialize
    ///
    /// Keeps only what a FAILED report needs. `None` when there is no
    /// `ResponseURL` to report to.
    pub fn salvage(raw: &Value) -> Option<Self> {
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        let response_url = text("ResponseURL").filter(|url| !url.is_empty())?;
        Some(Self {
            request_type: RequestType::from(text("RequestType").unwrap_or_default()),
            resource_properties: ResourceProperties::default(),
            old_resource_properties: None,
            stack_id: text("StackId").unwrap_or_default(),
            request_id: text("RequestId").unwrap_or_default(),
            logical_resource_id: text("LogicalResourceId").unwrap_or_default(),
            response_url,
            physical_resource_id: text("PhysicalResourceId"),
            resource_type: text("ResourceType"),
        })
    }
}

/// Handler-specific key/value bag from the template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceProperties(Map<String, Value>);

impl ResourceProperties {
    pub fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// A string property that must be present
    pub fn required_str(&self, name: &str) -> Result<&str> {
        match self.0.get(name) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(Error::InvalidProperty {
                name: name.to_string(),
                reason: "expected a string".to_string(),
            }),
            None => Err(Error::MissingProperty(name.to_string())),
        }
    }

    /// A string property that may be absent; empty strings count as absent
    pub fn optional_str(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Template booleans arrive as the strings "true" / "false"
    pub fn flag(&self, name: &str) -> Result<bool> {
        match self.0.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(Error::InvalidProperty {
                    name: name.to_string(),
                    reason: format!("expected \"true\" or \"false\", got {:?}", other),
                }),
            },
            Some(_) => Err(Error::InvalidProperty {
                name: name.to_string(),
                reason: "expected a boolean string".to_string(),
            }),
            None => Err(Error::MissingProperty(name.to_string())),
        }
    }

    /// A list given either as a JSON array or a comma-delimited string
    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        match self.0.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(Error::InvalidProperty {
                        name: name.to_string(),
                        reason: "list items must be strings".to_string(),
                    }),
                })
                .collect(),
            Some(Value::String(s)) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(Error::InvalidProperty {
                name: name.to_string(),
                reason: "expected a list or comma-delimited string".to_string(),
            }),
        }
    }
}

/// Terminal status reported to CloudFormation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Body of the callback PUT
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_echo: bool,
    pub data: Map<String, Value>,
}

/// What a handler produced on success
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub data: Map<String, Value>,
    pub physical_resource_id: Option<String>,
    pub no_echo: bool,
}

impl Outcome {
    /// Outcome carrying just a `Message`
    pub fn message(message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("Message".to_string(), Value::String(message.into()));
        Self {
            data,
            physical_resource_id: None,
            no_echo: false,
        }
    }

    /// Outcome for verbs a resource deliberately ignores
    pub fn no_op(request_type: &RequestType) -> Self {
        Self::message(format!(
            "{} not supported, no operation performed.",
            request_type
        ))
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn with_physical_resource_id(mut self, id: impl Into<String>) -> Self {
        self.physical_resource_id = Some(id.into());
        self
    }

    /// Hide `Data` from console output and describe calls
    pub fn sensitive(mut self) -> Self {
        self.no_echo = true;
        self
    }
}
