use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};
use url::Url;

use crate::Map;

/// Property injected by CloudFormation into every custom resource's properties.
const SERVICE_TOKEN_KEY: &str = "ServiceToken";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Failed,
}

/// A lifecycle request sent by CloudFormation to a custom resource provider.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    pub request_type: RequestType,
    pub request_id: String,
    #[serde(rename = "ResponseURL")]
    pub response_url: Url,
    pub stack_id: String,
    pub resource_type: String,
    pub logical_resource_id: String,
    /// Empty on `Create`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub physical_resource_id: String,
    #[serde(default)]
    pub resource_properties: Map,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub old_resource_properties: Map,
}

impl Event {
    /// The physical resource id reported when the handler does not return one.
    ///
    /// A `Create` has no prior id, so the request id stands in for it; `Update`
    /// and `Delete` keep the id CloudFormation already knows. An `Update` or
    /// `Delete` that arrives without one also falls back to the request id,
    /// since CloudFormation rejects an empty `PhysicalResourceId`.
    pub fn provisional_physical_resource_id(&self) -> &str {
        match self.request_type {
            RequestType::Update | RequestType::Delete if !self.physical_resource_id.is_empty() => {
                &self.physical_resource_id
            }
            _ => &self.request_id,
        }
    }

    /// Deserializes `ResourceProperties`, ignoring the `ServiceToken` key.
    pub fn resource_properties<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        without_service_token(&self.resource_properties).deserialize_into()
    }

    /// Deserializes `OldResourceProperties`, ignoring the `ServiceToken` key.
    pub fn old_resource_properties<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        without_service_token(&self.old_resource_properties).deserialize_into()
    }
}

// Not necessary and can conflict with serde(deny_unknown_fields)
fn without_service_token(properties: &Map) -> Map {
    let mut properties = properties.clone();
    properties.remove(SERVICE_TOKEN_KEY);
    properties
}

/// The result document PUT to an event's `ResponseURL`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_echo: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map,
}

impl Response {
    /// A successful response echoing the identifiers of `event`.
    pub fn new(event: &Event) -> Self {
        Response {
            status: Status::Success,
            reason: None,
            physical_resource_id: event.provisional_physical_resource_id().into(),
            stack_id: event.stack_id.clone(),
            request_id: event.request_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
            no_echo: false,
            data: Default::default(),
        }
    }

    /// Marks the response `FAILED`, dropping any data.
    pub fn fail<S: Into<String>>(&mut self, reason: S) {
        self.status = Status::Failed;
        self.reason = Some(reason.into());
        self.no_echo = false;
        self.data = Default::default();
    }
}
