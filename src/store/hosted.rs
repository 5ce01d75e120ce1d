//! Hosted backend-as-a-service client.
//!
//! One reqwest client serves both collaborators: objects go through the
//! storage API under `/storage/v1`, image rows through the table API under
//! `/rest/v1`. Every request carries the project API key as both the `apikey`
//! header and a bearer token.
//!
//! Requests are sent once. Failures are reported to the caller as
//! [`AppError::Backend`] or [`AppError::Http`] and never retried here.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{MetadataStore, ObjectStorage, PutOptions};
use crate::error::{AppError, Result};
use crate::models::{ImageRecord, NewImageRecord};

const STORAGE_PREFIX: [&str; 3] = ["storage", "v1", "object"];
const TABLE_PREFIX: [&str; 2] = ["rest", "v1"];

/// Row shape of the hosted images table
#[derive(Debug, Deserialize)]
struct TableRow {
    id: u64,
    created_at: DateTime<Utc>,
    file_name: String,
    file_size: u64,
    url: String,
}

impl From<TableRow> for ImageRecord {
    fn from(row: TableRow) -> Self {
        ImageRecord {
            id: row.id,
            created_at: row.created_at,
            file_name: row.file_name,
            file_size: row.file_size,
            storage_path: row.url,
        }
    }
}

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    file_name: &'a str,
    file_size: u64,
    url: &'a str,
}

/// Client for a hosted storage + table backend
#[derive(Clone)]
pub struct HostedBackend {
    client: reqwest::Client,
    base_url: Url,
    table: String,
}

impl HostedBackend {
    /// Build a client for the project at `base_url`, authenticated with `api_key`
    pub fn new(base_url: &str, api_key: &str, table: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::InvalidInput(format!("Invalid BACKEND_URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::InvalidInput(
                "BACKEND_URL must be an http(s) URL".to_string(),
            ));
        }

        let key = HeaderValue::from_str(api_key)
            .map_err(|_| AppError::InvalidInput("Invalid BACKEND_API_KEY".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| AppError::InvalidInput("Invalid BACKEND_API_KEY".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            table: table.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn object_url(&self, bucket: &str, key: &str) -> Url {
        let mut segments = STORAGE_PREFIX.to_vec();
        segments.extend([bucket, key]);
        self.endpoint(&segments)
    }

    fn table_url(&self) -> Url {
        let mut segments = TABLE_PREFIX.to_vec();
        segments.push(self.table.as_str());
        self.endpoint(&segments)
    }
}

/// Pass 2xx responses through, turn anything else into `AppError::Backend`
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(AppError::Backend {
        status: status.as_u16(),
        message,
    })
}

fn is_duplicate(status: u16, message: &str) -> bool {
    status == StatusCode::CONFLICT.as_u16()
        || (status == StatusCode::BAD_REQUEST.as_u16()
            && (message.contains("Duplicate") || message.contains("already exists")))
}

#[async_trait]
impl ObjectStorage for HostedBackend {
    async fn put(&self, bucket: &str, key: &str, bytes: Bytes, options: PutOptions) -> Result<()> {
        let metadata = serde_json::to_vec(&options.metadata).unwrap_or_default();

        let response = self
            .client
            .post(self.object_url(bucket, key))
            .header(CONTENT_TYPE, options.content_type.as_str())
            .header(CACHE_CONTROL, format!("max-age={}", options.cache_control))
            .header("x-upsert", options.upsert.to_string())
            .header("x-metadata", BASE64.encode(metadata))
            .body(bytes)
            .send()
            .await?;

        match check(response).await {
            Ok(_) => Ok(()),
            Err(AppError::Backend { status, message }) if is_duplicate(status, &message) => {
                Err(AppError::ObjectAlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        let mut segments = STORAGE_PREFIX.to_vec();
        segments.push(bucket);

        let response = self
            .client
            .delete(self.endpoint(&segments))
            .json(&json!({ "prefixes": [key] }))
            .send()
            .await?;
        check(response).await?;

        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        let mut segments = STORAGE_PREFIX.to_vec();
        segments.extend(["public", bucket, key]);
        self.endpoint(&segments).to_string()
    }
}

#[async_trait]
impl MetadataStore for HostedBackend {
    async fn list(&self) -> Result<Vec<ImageRecord>> {
        let response = self
            .client
            .get(self.table_url())
            .query(&[("select", "*"), ("order", "created_at.desc,id.desc")])
            .send()
            .await?;

        let rows: Vec<TableRow> = check(response).await?.json().await?;
        Ok(rows.into_iter().map(ImageRecord::from).collect())
    }

    async fn insert(&self, record: NewImageRecord) -> Result<ImageRecord> {
        let response = self
            .client
            .post(self.table_url())
            .header("Prefer", "return=representation")
            .json(&InsertRow {
                file_name: &record.file_name,
                file_size: record.file_size,
                url: &record.storage_path,
            })
            .send()
            .await?;

        let rows: Vec<TableRow> = check(response).await?.json().await?;
        rows.into_iter()
            .next()
            .map(ImageRecord::from)
            .ok_or_else(|| AppError::Backend {
                status: StatusCode::OK.as_u16(),
                message: "Insert returned no rows".to_string(),
            })
    }

    async fn delete(&self, id: u64) -> Result<()> {
        let response = self
            .client
            .delete(self.table_url())
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;

        let rows: Vec<serde_json::Value> = check(response).await?.json().await?;
        if rows.is_empty() {
            return Err(AppError::ImageNotFound);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.table_url())
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        check(response).await?;

        Ok(())
    }
}
