//! Minimal Supabase PostgREST client.
//!
//! The knowledge base lives in a hosted Postgres instance fronted by
//! PostgREST. This client covers exactly the three operations the crate
//! needs: inserting a document record, inserting knowledge chunks, and
//! invoking the `exec_sql` RPC used by the migration command.
//!
//! Credentials come from the environment (`SUPABASE_URL`,
//! `SUPABASE_SERVICE_KEY`); construction fails before any request is sent
//! when either is missing.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::SupabaseConfig;

const URL_ENV: &str = "SUPABASE_URL";
const KEY_ENV: &str = "SUPABASE_SERVICE_KEY";

/// New row for the `documents` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewDocument {
    pub name: String,
    pub document_type: String,
    pub file_path: String,
    pub status: String,
    pub total_chunks: i64,
}

/// New row for the `knowledge_chunks` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewChunk {
    pub document_id: String,
    pub document_name: String,
    pub document_type: String,
    pub chunk_index: i64,
    pub content: String,
    pub content_hash: String,
    pub section_title: String,
    pub section_hierarchy: Vec<String>,
    pub embedding: Vec<f32>,
    pub is_binding: bool,
    pub source_file_path: String,
}

pub struct SupabaseClient {
    base_url: String,
    service_key: String,
    http: reqwest::Client,
}

impl SupabaseClient {
    /// Build a client from config and environment. The config may override
    /// the project URL; the service key is environment-only.
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let base_url = match &config.url {
            Some(url) => url.clone(),
            None => std::env::var(URL_ENV)
                .map_err(|_| anyhow::anyhow!("{} environment variable not set", URL_ENV))?,
        };
        let service_key = std::env::var(KEY_ENV)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", KEY_ENV))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            http,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }

    /// Insert a document record and return the id of the created row.
    pub async fn insert_document(&self, doc: &NewDocument) -> Result<String> {
        let response = self
            .post("/rest/v1/documents")
            .header("Prefer", "return=representation")
            .json(doc)
            .send()
            .await
            .context("Supabase document insert request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Supabase document insert error {}: {}", status, body);
        }

        let rows: Vec<Value> = response.json().await?;
        row_id(rows.first()).context("Supabase document insert returned no id")
    }

    /// Insert one knowledge chunk row.
    pub async fn insert_chunk(&self, chunk: &NewChunk) -> Result<()> {
        let response = self
            .post("/rest/v1/knowledge_chunks")
            .header("Prefer", "return=representation")
            .json(chunk)
            .send()
            .await
            .context("Supabase chunk insert request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Supabase chunk insert error {}: {}", status, body);
        }

        Ok(())
    }

    /// Run raw SQL through the `exec_sql` RPC.
    ///
    /// Returns `Ok(true)` when the statement ran, `Ok(false)` when the RPC
    /// responded non-2xx (typically because the function does not exist in
    /// the project), and an error only for transport failures.
    pub async fn exec_sql(&self, sql: &str) -> Result<bool> {
        let response = self
            .post("/rest/v1/rpc/exec_sql")
            .json(&serde_json::json!({ "query": sql }))
            .send()
            .await
            .context("Supabase exec_sql request failed")?;

        Ok(response.status().is_success())
    }
}

/// Pull the `id` out of a returned representation row. Supabase projects
/// use integer or UUID primary keys depending on schema age, so both are
/// accepted.
fn row_id(row: Option<&Value>) -> Option<String> {
    let id = row?.get("id")?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_id_accepts_number_and_string() {
        let row = serde_json::json!({ "id": 42 });
        assert_eq!(row_id(Some(&row)), Some("42".to_string()));

        let row = serde_json::json!({ "id": "0a1b" });
        assert_eq!(row_id(Some(&row)), Some("0a1b".to_string()));

        assert_eq!(row_id(None), None);
        let row = serde_json::json!({ "id": null });
        assert_eq!(row_id(Some(&row)), None);
    }

    #[test]
    fn test_chunk_row_serializes_expected_columns() {
        let chunk = NewChunk {
            document_id: "7".to_string(),
            document_name: "Development Code".to_string(),
            document_type: "city_code".to_string(),
            chunk_index: 1,
            content: "text".to_string(),
            content_hash: "abc".to_string(),
            section_title: "2.7.3700 Purpose".to_string(),
            section_hierarchy: vec!["Ch. 2.7".to_string()],
            embedding: vec![0.1, 0.2],
            is_binding: true,
            source_file_path: "https://example.test/code".to_string(),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        for key in [
            "document_id",
            "document_name",
            "document_type",
            "chunk_index",
            "content",
            "content_hash",
            "section_title",
            "section_hierarchy",
            "embedding",
            "is_binding",
            "source_file_path",
        ] {
            assert!(json.get(key).is_some(), "missing column: {}", key);
        }
    }
}
