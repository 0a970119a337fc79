
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{Result, ZohoError};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Timestamp layout Zoho uses when not returning RFC 3339
const ZOHO_DATETIME_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

/// A field in a Zoho Creator form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZohoField {
    pub api_name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub lookup: Option<Map<String, Value>>,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
}

/// A form in Zoho Creator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZohoForm {
    pub link_name: String,
    pub display_name: String,
    #[serde(default)]
    pub fields: Vec<ZohoField>,
    #[serde(default = "default_access_type")]
    pub access_type: String,
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
}

/// A report (view over a form) in Zoho Creator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZohoReport {
    pub link_name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_link_name: Option<String>,
}

/// A record in a Zoho Creator form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZohoRecord {
    pub id: String,
    pub form_link_name: String,
    pub created_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
    pub data: Map<String, Value>,
}

fn default_access_type() -> String {
    "read".to_string()
}

impl ZohoRecord {
    /// Build a record from a raw API object carrying `ID`, `Created_Time`
    /// and `Modified_Time`. The whole object becomes `data`.
    #[inline]
    pub fn from_api(form_link_name: &str, raw: Map<String, Value>) -> Result<Self> {
        let id = match raw.get("ID") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(ZohoError::Parse("Record is missing an ID".to_string())),
        };

        Ok(Self {
            id,
            form_link_name: form_link_name.to_string(),
            created_time: timestamp_field(&raw, "Created_Time")?,
            modified_time: timestamp_field(&raw, "Modified_Time")?,
            data: raw,
        })
    }
}

fn timestamp_field(raw: &Map<String, Value>, key: &str) -> Result<DateTime<Utc>> {
    let value = raw
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ZohoError::Parse(format!("Record is missing {}", key)))?;
    parse_timestamp(value)
}

/// Parse an RFC 3339 timestamp (trailing `Z` allowed) or Zoho's
/// `dd-Mon-yyyy HH:MM:SS`, which is taken as UTC.
#[inline]
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, ZOHO_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| ZohoError::Parse(format!("Invalid timestamp '{}': {}", value, e)))
}

/// In-memory cache of form metadata
#[derive(Debug, Clone)]
pub struct FormCache {
    forms: HashMap<String, ZohoForm>,
    ttl: Duration,
    last_refresh: Option<Instant>,
}

impl FormCache {
    #[inline]
    pub fn new(ttl: Duration) -> Self {
        Self {
            forms: HashMap::new(),
            ttl,
            last_refresh: None,
        }
    }

    #[inline]
    pub fn needs_refresh(&self) -> bool {
        self.last_refresh
            .is_none_or(|refreshed| refreshed.elapsed() > self.ttl)
    }

    /// Replace every cached form and restart the TTL
    #[inline]
    pub fn update_forms(&mut self, forms: Vec<ZohoForm>) {
        self.forms = forms
            .into_iter()
            .map(|form| (form.link_name.clone(), form))
            .collect();
        self.last_refresh = Some(Instant::now());
    }

    #[inline]
    pub fn get_form(&self, link_name: &str) -> Option<&ZohoForm> {
        self.forms.get(link_name)
    }

    /// Cached forms ordered by link name
    #[inline]
    pub fn forms(&self) -> Vec<ZohoForm> {
        let mut forms: Vec<ZohoForm> = self.forms.values().cloned().collect();
        forms.sort_by(|a, b| a.link_name.cmp(&b.link_name));
        forms
    }

    #[inline]
    pub fn invalidate(&mut self) {
        self.last_refresh = None;
    }
}

impl Default for FormCache {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
