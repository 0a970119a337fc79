//! MCP Resources for Zoho Creator
//!
//! Exposes forms and reports under the `zoho://` scheme.

use crate::mcp::errors::McpError;
use crate::mcp::protocol::*;
use crate::mcp::server::ResourceProvider;
use crate::zoho::ZohoCreatorService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const RESOURCE_SCHEME: &str = "zoho";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceUriError {
    #[error("Invalid resource URI: {0}")]
    Malformed(String),
    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Empty resource path")]
    EmptyPath,
    #[error("Missing link name for resource type: {0}")]
    MissingLinkName(String),
    #[error("Unknown resource type: {0}")]
    UnknownType(String),
}

/// A parsed `zoho://` resource address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    Forms,
    Reports,
    Form(String),
    Report {
        link_name: String,
        criteria: Option<String>,
    },
}

impl ResourceUri {
    #[inline]
    pub fn parse(uri: &str) -> Result<Self, ResourceUriError> {
        let url = Url::parse(uri).map_err(|e| ResourceUriError::Malformed(e.to_string()))?;
        if url.scheme() != RESOURCE_SCHEME {
            return Err(ResourceUriError::UnsupportedScheme(url.scheme().to_string()));
        }

        // The first path part lands in the host for non-special schemes
        let full_path = format!("{}{}", url.host_str().unwrap_or_default(), url.path());
        let parts: Vec<&str> = full_path.split('/').filter(|p| !p.is_empty()).collect();

        let Some((&kind, rest)) = parts.split_first() else {
            return Err(ResourceUriError::EmptyPath);
        };

        match kind {
            "forms" => Ok(Self::Forms),
            "reports" => Ok(Self::Reports),
            "form" | "report" => {
                let Some(&link_name) = rest.first() else {
                    return Err(ResourceUriError::MissingLinkName(kind.to_string()));
                };
                let link_name = decode(link_name);

                if kind == "form" {
                    return Ok(Self::Form(link_name));
                }

                let criteria = match rest.get(1..) {
                    Some([filter, criteria @ ..]) if *filter == "filter" && !criteria.is_empty() => {
                        Some(decode(&criteria.join("/")))
                    }
                    _ => None,
                };
                Ok(Self::Report {
                    link_name,
                    criteria,
                })
            }
            other => Err(ResourceUriError::UnknownType(other.to_string())),
        }
    }
}

fn decode(part: &str) -> String {
    percent_decode_str(part).decode_utf8_lossy().into_owned()
}

/// Resource provider backed by a Zoho Creator application
pub struct ZohoResources {
    service: Arc<ZohoCreatorService>,
}

impl ZohoResources {
    #[inline]
    pub fn new(service: Arc<ZohoCreatorService>) -> Self {
        Self { service }
    }

    fn resource(uri: String, name: String, description: Option<String>) -> Resource {
        Resource {
            uri,
            name,
            description,
            mime_type: Some(JSON_MIME_TYPE.to_string()),
        }
    }
}

#[async_trait]
impl ResourceProvider for ZohoResources {
    #[inline]
    async fn list(&self) -> Result<Vec<Resource>> {
        let forms = self.service.list_forms(false).context("Failed to list forms")?;
        let reports = self.service.list_reports().context("Failed to list reports")?;

        let mut resources = vec![
            Self::resource(
                "zoho://forms".to_string(),
                "All Forms".to_string(),
                Some("List of all available forms".to_string()),
            ),
            Self::resource(
                "zoho://reports".to_string(),
                "All Reports".to_string(),
                Some("List of all available reports".to_string()),
            ),
        ];

        resources.extend(forms.iter().map(|form| {
            Self::resource(
                format!("zoho://form/{}", form.link_name),
                form.display_name.clone(),
                Some(format!("Form definition and fields for {}", form.display_name)),
            )
        }));
        resources.extend(reports.iter().map(|report| {
            Self::resource(
                format!("zoho://report/{}", report.link_name),
                report.display_name.clone(),
                Some(format!("Records from {}", report.display_name)),
            )
        }));

        debug!("Listing {} resources", resources.len());
        Ok(resources)
    }

    #[inline]
    fn templates(&self) -> Vec<ResourceTemplate> {
        vec![ResourceTemplate {
            uri_template: "zoho://report/{report}/filter/{criteria}".to_string(),
            name: "Filtered report".to_string(),
            description: Some(
                "Records from a report matching a Zoho criteria expression".to_string(),
            ),
            mime_type: Some(JSON_MIME_TYPE.to_string()),
        }]
    }

    #[inline]
    async fn read(&self, uri: &str) -> Result<ResourceContents> {
        let parsed = ResourceUri::parse(uri).map_err(|e| McpError::InvalidParameters {
            message: e.to_string(),
        })?;
        debug!("Reading resource {:?}", parsed);

        let body = match parsed {
            ResourceUri::Forms => {
                let forms = self.service.list_forms(false)?;
                let forms: Vec<_> = forms
                    .iter()
                    .map(|form| {
                        json!({
                            "link_name": form.link_name,
                            "display_name": form.display_name,
                            "field_count": form.fields.len(),
                        })
                    })
                    .collect();
                json!(forms)
            }
            ResourceUri::Reports => {
                let reports = self.service.list_reports()?;
                let reports: Vec<_> = reports
                    .iter()
                    .map(|report| {
                        json!({
                            "link_name": report.link_name,
                            "display_name": report.display_name,
                        })
                    })
                    .collect();
                json!(reports)
            }
            ResourceUri::Form(link_name) => {
                let form = self
                    .service
                    .get_form(&link_name)?
                    .ok_or_else(|| McpError::ResourceNotFound {
                        uri: uri.to_string(),
                    })?;
                json!({
                    "link_name": form.link_name,
                    "display_name": form.display_name,
                    "fields": form.fields,
                })
            }
            ResourceUri::Report {
                link_name,
                criteria,
            } => {
                let records =
                    self.service
                        .get_report_records(&link_name, criteria.as_deref(), None)?;
                json!({
                    "report_name": link_name,
                    "records": records,
                })
            }
        };

        Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: Some(JSON_MIME_TYPE.to_string()),
            text: serde_json::to_string_pretty(&body)?,
        })
    }
}
