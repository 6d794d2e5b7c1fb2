//! Burp Suite proxy-history export reading and writing.
//!
//! Burp exports the selected proxy history as an XML document with one
//! `<item>` per captured transaction:
//!
//! ```xml
//! <items burpVersion="2023.10.3.4" exportTime="Mon Jan 08 10:12:44 GMT 2024">
//!   <item>
//!     <url><![CDATA[https://api.example.com/users?id=5]]></url>
//!     <host ip="93.184.216.34">api.example.com</host>
//!     <method><![CDATA[GET]]></method>
//!     <path><![CDATA[/users?id=5]]></path>
//!     <request base64="true"><![CDATA[R0VUIC91c2Vycz9pZD01IEhUVFAvMS4x]]></request>
//!     <status>200</status>
//!     ...
//!   </item>
//! </items>
//! ```
//!
//! [`BurpExport`] is the typed view of that document. [`NormalizedExport`]
//! writes the normalized records back out in the same shape, minus the
//! auxiliary fields and plus the extracted `<param>`.

// Internal imports (std, crate)
use std::path::Path;

use crate::normalize::NormalizedRecord;
use crate::Error;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Root of a Burp proxy-history export (`<items>`).
#[derive(Debug, Default, Deserialize)]
pub struct BurpExport {
    #[serde(rename = "@burpVersion", default)]
    pub burp_version: Option<String>,
    #[serde(rename = "@exportTime", default)]
    pub export_time: Option<String>,
    #[serde(rename = "item", default)]
    pub items: Vec<RawRecord>,
}

/// One captured HTTP transaction (`<item>`), exactly as exported.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    pub time: Option<String>,
    pub url: Option<String>,
    pub host: Option<Host>,
    pub port: Option<String>,
    pub protocol: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub extension: Option<String>,
    pub request: Option<EncodedText>,
    pub status: Option<String>,
    pub responselength: Option<String>,
    pub mimetype: Option<String>,
    pub response: Option<EncodedText>,
    pub comment: Option<String>,
}

/// `<host ip="...">name</host>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Host {
    #[serde(rename = "@ip", default)]
    pub ip: Option<String>,
    #[serde(rename = "$text", default)]
    pub name: String,
}

/// Request or response payload, base64 encoded unless the attribute says otherwise.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncodedText {
    #[serde(rename = "@base64", default)]
    pub base64: Option<String>,
    #[serde(rename = "$text", default)]
    pub text: String,
}

impl EncodedText {
    /// Burp marks payloads with `base64="true"`; a missing attribute is treated the same way.
    pub fn is_base64(&self) -> bool {
        !matches!(self.base64.as_deref(), Some("false"))
    }
}

impl BurpExport {
    /// Parse an export from its XML text.
    pub fn from_xml_str(xml: &str) -> crate::Result<Self> {
        quick_xml::de::from_str(xml)
            .map_err(|e| Error::xml(format!("Failed to parse Burp export: {}", e)))
    }

    /// Load an export from disk.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let export = Self::from_xml_str(&content).map_err(|e| match e {
            Error::Xml(msg) => Error::xml(format!("{} ({})", msg, path.display())),
            other => other,
        })?;
        log::debug!(
            "Loaded {} records from {} (Burp {})",
            export.items.len(),
            path.display(),
            export.burp_version.as_deref().unwrap_or("unknown")
        );
        Ok(export)
    }
}

/// Normalized records rendered in the export's own `<items><item>` layout.
pub struct NormalizedExport<'a> {
    records: &'a [NormalizedRecord],
}

#[derive(Serialize)]
struct ItemsView<'a> {
    #[serde(rename = "item")]
    items: Vec<ItemView<'a>>,
}

#[derive(Serialize)]
struct ItemView<'a> {
    url: &'a str,
    method: &'a str,
    path: &'a str,
    request: RequestView<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mimetype: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<&'a str>,
}

#[derive(Serialize)]
struct RequestView<'a> {
    #[serde(rename = "@base64")]
    base64: &'static str,
    #[serde(rename = "$text")]
    text: &'a str,
}

impl<'a> From<&'a NormalizedRecord> for ItemView<'a> {
    fn from(record: &'a NormalizedRecord) -> Self {
        Self {
            url: &record.url,
            method: record.method.as_str(),
            path: &record.path,
            request: RequestView {
                base64: "false",
                text: &record.request_text,
            },
            status: record.status.as_deref(),
            mimetype: record.mimetype.as_deref(),
            param: record.param.as_deref(),
        }
    }
}

impl<'a> NormalizedExport<'a> {
    pub fn new(records: &'a [NormalizedRecord]) -> Self {
        Self { records }
    }

    /// Render the records as an XML document, declaration included.
    pub fn to_xml_string(&self) -> crate::Result<String> {
        let view = ItemsView {
            items: self.records.iter().map(ItemView::from).collect(),
        };
        let body = quick_xml::se::to_string_with_root("items", &view)
            .map_err(|e| Error::xml(format!("Failed to serialize normalized records: {}", e)))?;
        Ok(format!("<?xml version=\"1.0\"?>\n{}\n", body))
    }

    /// Write the XML document to `path`.
    pub async fn write_to_file<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = self.to_xml_string()?;
        fs::write(path, content).await?;
        Ok(())
    }
}
