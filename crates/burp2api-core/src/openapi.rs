//! OpenAPI document model and the traffic-to-OpenAPI mapper.
//!
//! The model covers the subset of OpenAPI 3.0 that can be reconstructed from
//! observed traffic: servers, path items, operations, query parameters,
//! JSON request bodies and one response per operation.
//!
//! # Examples
//!
//! ```
//! use burp2api_core::config::Config;
//! use burp2api_core::normalize::{Method, NormalizedRecord};
//! use burp2api_core::openapi::to_openapi;
//!
//! # fn main() -> burp2api_core::Result<()> {
//! let records = vec![NormalizedRecord {
//!     url: "https://api.example.com/users?id=5".to_string(),
//!     method: Method::Get,
//!     path: "/users".to_string(),
//!     status: Some("200".to_string()),
//!     request_text: String::new(),
//!     param: Some("id=5".to_string()),
//!     mimetype: None,
//! }];
//!
//! let doc = to_openapi(&records, &Config::default())?;
//! assert_eq!(doc.title(), "Burp2API - example");
//! assert_eq!(doc.base_path(), Some("https://api.example.com"));
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::Path;

use crate::config::Config;
use crate::normalize::{Method, NormalizedRecord};
use crate::Error;

// External imports (alphabetized)
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::fs;

const JSON_MEDIA_TYPE: &str = "application/json";
const DEFAULT_STATUS: u16 = 200;

/// Root OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// Version of the OpenAPI specification the document follows.
    pub openapi: String,
    /// Metadata about the API.
    pub info: OpenApiInfo,
    /// Connectivity information for the target server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<OpenApiServer>,
    /// The available paths and operations, in first-seen order.
    #[serde(default)]
    pub paths: IndexMap<String, OpenApiPathItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiInfo {
    /// The title of the API.
    pub title: String,
    /// The version of the OpenAPI document.
    pub version: String,
    /// A short description of the API. CommonMark syntax MAY be used for rich text representation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiServer {
    /// A URL to the target host.
    pub url: String,
}

/// Operations available on a single path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenApiPathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<OpenApiOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<OpenApiOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<OpenApiOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<OpenApiOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<OpenApiOperation>,
}

impl OpenApiPathItem {
    pub fn operation(&self, method: Method) -> Option<&OpenApiOperation> {
        match method {
            Method::Get => self.get.as_ref(),
            Method::Post => self.post.as_ref(),
            Method::Delete => self.delete.as_ref(),
            Method::Put => self.put.as_ref(),
            Method::Patch => self.patch.as_ref(),
        }
    }

    fn operation_slot(&mut self, method: Method) -> &mut Option<OpenApiOperation> {
        match method {
            Method::Get => &mut self.get,
            Method::Post => &mut self.post,
            Method::Delete => &mut self.delete,
            Method::Put => &mut self.put,
            Method::Patch => &mut self.patch,
        }
    }
}

/// A single API operation on a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiOperation {
    /// A list of parameters that are applicable for this operation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<OpenApiParameter>,
    /// The request body applicable for this operation.
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<OpenApiRequestBody>,
    /// The list of possible responses as they are returned from executing this operation.
    pub responses: IndexMap<String, OpenApiResponse>,
}

impl OpenApiOperation {
    fn with_status(code: u16) -> Self {
        let mut responses = IndexMap::new();
        responses.insert(
            code.to_string(),
            OpenApiResponse {
                description: format!("Response status {}", code),
            },
        );
        Self {
            parameters: Vec::new(),
            request_body: None,
            responses,
        }
    }

    fn add_query_parameter(&mut self, name: &str) {
        if !self.parameters.iter().any(|p| p.name == name) {
            self.parameters.push(OpenApiParameter::query(name));
        }
    }

    fn add_body_properties<'a>(&mut self, keys: impl IntoIterator<Item = &'a String>) {
        let body = self.request_body.get_or_insert_with(|| OpenApiRequestBody {
            content: IndexMap::new(),
        });
        let media = body
            .content
            .entry(JSON_MEDIA_TYPE.to_string())
            .or_insert_with(|| OpenApiMediaType {
                schema: OpenApiSchema::object(),
            });
        for key in keys {
            media
                .schema
                .properties
                .entry(key.clone())
                .or_insert_with(OpenApiSchema::string);
        }
    }
}

/// Information about a single parameter in an OpenAPI operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiParameter {
    /// The name of the parameter. Parameter names are case sensitive.
    pub name: String,
    /// The location of the parameter. Possible values: "query", "header", "path", or "cookie".
    #[serde(rename = "in")]
    pub in_: String,
    /// Determines whether this parameter is mandatory.
    pub required: bool,
    /// The schema defining the type used for the parameter.
    pub schema: OpenApiSchema,
}

impl OpenApiParameter {
    /// Optional string-typed query parameter
    pub fn query(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            in_: "query".to_string(),
            required: false,
            schema: OpenApiSchema::string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiRequestBody {
    /// The content of the request body, keyed by media type.
    pub content: IndexMap<String, OpenApiMediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiMediaType {
    pub schema: OpenApiSchema,
}

/// Inferred schema. Only `string` and flat `object` shapes are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, OpenApiSchema>,
}

impl OpenApiSchema {
    pub fn string() -> Self {
        Self {
            schema_type: "string".to_string(),
            properties: IndexMap::new(),
        }
    }

    pub fn object() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiResponse {
    /// A short description of the response.
    pub description: String,
}

impl OpenApiDocument {
    /// Document with metadata only: no servers and no paths.
    pub fn empty(config: &Config) -> Self {
        Self {
            openapi: config.openapi_version.clone(),
            info: OpenApiInfo {
                title: String::new(),
                version: config.api_version.clone(),
                description: Some(config.description.clone()),
            },
            servers: Vec::new(),
            paths: IndexMap::new(),
        }
    }

    /// Get the title of the API
    pub fn title(&self) -> &str {
        &self.info.title
    }

    /// Get the base path of the API (first server URL)
    pub fn base_path(&self) -> Option<&str> {
        self.servers.first().map(|server| server.url.as_str())
    }

    /// Look up the operation for `method` on `path`.
    pub fn operation(&self, path: &str, method: Method) -> Option<&OpenApiOperation> {
        self.paths.get(path)?.operation(method)
    }

    /// Pretty-printed JSON rendering
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON rendering to `path`.
    pub async fn write_to_file<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = self.to_json_pretty()?;
        fs::write(path, content).await?;
        Ok(())
    }
}

/// Build an OpenAPI document from normalized traffic.
///
/// The server and title come from the first record. Each record adds to at
/// most one operation; the first record seen for a path and method fixes its
/// response, later ones only contribute parameters and body properties.
pub fn to_openapi(
    records: &[NormalizedRecord],
    config: &Config,
) -> crate::Result<OpenApiDocument> {
    let mut doc = OpenApiDocument::empty(config);
    let Some(first) = records.first() else {
        log::info!("No records to map; emitting an empty document");
        return Ok(doc);
    };

    let host = host_of(&first.url)?;
    doc.info.title = format!("{}{}", config.title_prefix, api_name(host));
    let server_url = match &config.server_url {
        Some(url) => url.as_str().trim_end_matches('/').to_string(),
        None => format!("https://{}", host),
    };
    doc.servers.push(OpenApiServer { url: server_url });

    for record in records {
        let item = doc.paths.entry(record.path.clone()).or_default();
        let operation = item
            .operation_slot(record.method)
            .get_or_insert_with(|| OpenApiOperation::with_status(status_code(record)));

        if let Some(param) = record.param.as_deref().filter(|p| !p.is_empty()) {
            apply_param(operation, param);
        }
    }

    log::info!(
        "Mapped {} records onto {} paths",
        records.len(),
        doc.paths.len()
    );
    Ok(doc)
}

/// Authority of a URL: the third `/`-separated segment (`scheme:` / `` / host).
pub fn host_of(url: &str) -> crate::Result<&str> {
    url.split('/')
        .nth(2)
        .filter(|host| !host.is_empty())
        .ok_or_else(|| Error::InvalidUrl(url.to_string()))
}

/// Short API name for a host.
///
/// A leading `www.` or `api.` label is dropped, then the first label is used:
/// `api.shop.example.com` gives `shop`, `example.com` gives `example`.
pub fn api_name(host: &str) -> &str {
    let host = strip_port(host);
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("api."))
        .unwrap_or(host);
    host.split('.').next().unwrap_or(host)
}

/// Host part of an authority. Bracketed IPv6 literals keep their colons.
fn strip_port(authority: &str) -> &str {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    authority.split(':').next().unwrap_or(authority)
}

/// Whether a parameter name is itself a JSON document.
///
/// Only the text before `=` is checked, so `{"a":"b"}` qualifies while
/// `data={"a":"b"}` does not.
pub fn is_json_name(name: &str) -> bool {
    serde_json::from_str::<JsonValue>(name).is_ok()
}

fn status_code(record: &NormalizedRecord) -> u16 {
    let Some(status) = record.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return DEFAULT_STATUS;
    };
    match status.parse::<u16>() {
        Ok(code) if (100..=599).contains(&code) => code,
        _ => {
            log::warn!(
                "Unrecognized status '{}' for {} {}; using {}",
                status,
                record.method,
                record.path,
                DEFAULT_STATUS
            );
            DEFAULT_STATUS
        }
    }
}

fn apply_param(operation: &mut OpenApiOperation, param: &str) {
    // Set semantics: repeated tokens collapse, order is not part of the contract.
    let tokens: IndexSet<&str> = param.split('&').collect();
    let mut body_parsed = false;

    for token in tokens {
        let name = token.split_once('=').map_or(token, |(name, _)| name);
        if name.is_empty() {
            continue;
        }
        if !is_json_name(name) {
            operation.add_query_parameter(name);
            continue;
        }
        if body_parsed {
            continue;
        }
        body_parsed = true;
        match serde_json::from_str::<JsonValue>(param) {
            Ok(JsonValue::Object(fields)) => operation.add_body_properties(fields.keys()),
            Ok(_) => log::debug!("JSON parameter is not an object; no body schema inferred"),
            Err(e) => log::debug!("Parameter string is not a JSON document: {}", e),
        }
    }
}
