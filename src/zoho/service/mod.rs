#[cfg(test)]
mod tests;

use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use super::client::ApiClient;
use super::models::{FormCache, ZohoField, ZohoForm, ZohoRecord, ZohoReport};
use crate::config::Config;
use crate::{Result, ZohoError};

/// Operations over Zoho Creator forms, reports and records
#[derive(Debug)]
pub struct ZohoCreatorService {
    client: ApiClient,
    cache: Mutex<FormCache>,
}

#[derive(Debug, Deserialize)]
struct FormsResponse {
    forms: Vec<FormSummary>,
}

#[derive(Debug, Deserialize)]
struct FormSummary {
    link_name: String,
    display_name: String,
    #[serde(default)]
    access_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FieldsResponse {
    fields: Vec<ZohoField>,
}

#[derive(Debug, Deserialize)]
struct ReportsResponse {
    reports: Vec<ZohoReport>,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    record: Map<String, Value>,
}

impl ZohoCreatorService {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let client = ApiClient::new(config)?;
        Ok(Self::with_client(
            client,
            Duration::from_secs(config.server.cache_ttl_seconds),
        ))
    }

    #[inline]
    pub fn with_client(client: ApiClient, cache_ttl: Duration) -> Self {
        Self {
            client,
            cache: Mutex::new(FormCache::new(cache_ttl)),
        }
    }

    /// Make sure credentials are accepted by the accounts server
    #[inline]
    pub fn check_connection(&self) -> Result<()> {
        self.client.auth().access_token().map(|_| ())
    }

    /// All forms with their fields; served from cache while it is fresh
    #[inline]
    pub fn list_forms(&self, force_refresh: bool) -> Result<Vec<ZohoForm>> {
        if !force_refresh {
            let cache = self.lock_cache();
            if !cache.needs_refresh() {
                debug!("Serving forms from cache");
                return Ok(cache.forms());
            }
        }

        let response: FormsResponse = self.get_json(&["forms"], &[])?;

        let mut forms = Vec::with_capacity(response.forms.len());
        for summary in response.forms {
            let fields = self.get_form_fields(&summary.link_name)?;
            forms.push(ZohoForm {
                link_name: summary.link_name,
                display_name: summary.display_name,
                fields,
                access_type: summary.access_type.unwrap_or_else(|| "read".to_string()),
                last_modified: Utc::now(),
            });
        }

        info!("Fetched {} forms from Zoho Creator", forms.len());
        self.lock_cache().update_forms(forms.clone());
        Ok(forms)
    }

    /// Look up one form by link name, refreshing a stale cache first
    #[inline]
    pub fn get_form(&self, link_name: &str) -> Result<Option<ZohoForm>> {
        let needs_refresh = self.lock_cache().needs_refresh();
        if needs_refresh {
            self.list_forms(true)?;
        }

        Ok(self.lock_cache().get_form(link_name).cloned())
    }

    fn get_form_fields(&self, form_link_name: &str) -> Result<Vec<ZohoField>> {
        let response: FieldsResponse =
            self.get_json(&["forms", form_link_name, "fields"], &[])?;
        debug!(
            "Form {} has {} fields",
            form_link_name,
            response.fields.len()
        );
        Ok(response.fields)
    }

    #[inline]
    pub fn list_reports(&self) -> Result<Vec<ZohoReport>> {
        let response: ReportsResponse = self.get_json(&["reports"], &[])?;
        debug!("Fetched {} reports", response.reports.len());
        Ok(response.reports)
    }

    /// Records of a form, optionally filtered by Zoho criteria
    #[inline]
    pub fn get_records(
        &self,
        form_link_name: &str,
        criteria: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<ZohoRecord>> {
        self.fetch_records(&["forms", form_link_name, "records"], form_link_name, criteria, limit)
    }

    /// Records shown by a report
    #[inline]
    pub fn get_report_records(
        &self,
        report_link_name: &str,
        criteria: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<ZohoRecord>> {
        self.fetch_records(
            &["reports", report_link_name, "records"],
            report_link_name,
            criteria,
            limit,
        )
    }

    fn fetch_records(
        &self,
        segments: &[&str],
        link_name: &str,
        criteria: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<ZohoRecord>> {
        let mut query = Vec::new();
        if let Some(criteria) = criteria.filter(|c| !c.trim().is_empty()) {
            query.push(("criteria", criteria.to_string()));
        }
        if let Some(limit) = limit.filter(|l| *l > 0) {
            query.push(("limit", limit.to_string()));
        }

        let response: RecordsResponse = self.get_json(segments, &query)?;
        response
            .records
            .into_iter()
            .map(|raw| ZohoRecord::from_api(link_name, raw))
            .collect()
    }

    #[inline]
    pub fn get_record(&self, form_link_name: &str, record_id: &str) -> Result<ZohoRecord> {
        let response: RecordResponse =
            self.get_json(&["forms", form_link_name, "records", record_id], &[])?;
        record_with_id(form_link_name, record_id, response.record)
    }

    #[inline]
    pub fn create_record(
        &self,
        form_link_name: &str,
        data: Map<String, Value>,
    ) -> Result<ZohoRecord> {
        let body = json!({ "data": data });
        let text = self
            .client
            .post_json(&["forms", form_link_name, "records"], &body)?;
        let response: RecordResponse = parse_response(&text)?;

        let mut record = ZohoRecord::from_api(form_link_name, response.record)?;
        info!("Created record {} in {}", record.id, form_link_name);
        record.data = data;
        Ok(record)
    }

    #[inline]
    pub fn update_record(
        &self,
        form_link_name: &str,
        record_id: &str,
        data: Map<String, Value>,
    ) -> Result<ZohoRecord> {
        let body = json!({ "data": data });
        let text = self
            .client
            .patch_json(&["forms", form_link_name, "records", record_id], &body)?;
        let response: RecordResponse = parse_response(&text)?;

        let mut record = record_with_id(form_link_name, record_id, response.record)?;
        info!("Updated record {} in {}", record_id, form_link_name);
        record.data = data;
        Ok(record)
    }

    fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> Result<T> {
        let text = self.client.get(segments, query)?;
        parse_response(&text)
    }

    fn lock_cache(&self) -> MutexGuard<'_, FormCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_response<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| ZohoError::Parse(format!("Unexpected Zoho response: {}", e)))
}

/// The record endpoints do not always echo the ID back; fall back to the requested one
fn record_with_id(
    form_link_name: &str,
    record_id: &str,
    mut raw: Map<String, Value>,
) -> Result<ZohoRecord> {
    raw.entry("ID")
        .or_insert_with(|| Value::String(record_id.to_string()));
    let mut record = ZohoRecord::from_api(form_link_name, raw)?;
    record.id = record_id.to_string();
    Ok(record)
}
