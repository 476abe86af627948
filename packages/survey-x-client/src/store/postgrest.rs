use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::debug;

use super::{MetadataStore, Result};
use crate::error::StoreError;
use crate::types::{MetadataRecord, RecordId, RecordStatus, ResourceId, SubmissionKind};

const REST_PATH: &str = "rest/v1/";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Metadata table served by PostgREST (Supabase). The table is expected to carry a
/// unique index on `(resource_id, identity)`; conflicts surface as HTTP 409.
#[derive(Clone, Debug)]
pub struct PostgrestStore {
    client: Client,
    table_url: Url,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|err| StoreError::Backend(format!("invalid store url {base_url}: {err}")))?;
        let table_url = base
            .join(REST_PATH)
            .and_then(|rest| rest.join(table))
            .map_err(|err| StoreError::Backend(format!("invalid table {table}: {err}")))?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| StoreError::Backend("api key is not a valid header value".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| StoreError::Backend("api key is not a valid header value".to_string()))?;
        headers.insert(HeaderName::from_static("apikey"), key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        Ok(Self { client, table_url })
    }

    pub fn table_url(&self) -> &Url {
        &self.table_url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    async fn rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("HTTP {status}: {body}")));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|err| StoreError::Malformed(err.to_string()))
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl MetadataStore for PostgrestStore {
    async fn insert(&self, record: MetadataRecord) -> Result<RecordId> {
        let response = self
            .send(
                self.client
                    .post(self.table_url.clone())
                    .header("Prefer", RETURN_REPRESENTATION)
                    .json(&record),
            )
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(StoreError::UniqueViolation {
                resource_id: record.resource_id,
                identity: record.identity,
            });
        }

        let inserted: Vec<MetadataRecord> = Self::rows(response).await?;
        let id = inserted
            .first()
            .map(|row| row.id)
            .ok_or_else(|| StoreError::Malformed("insert returned no rows".to_string()))?;
        debug!(%id, resource_id = %record.resource_id, "metadata record inserted");

        Ok(id)
    }

    async fn query(&self, resource_id: &ResourceId, identity: &Pubkey) -> Result<Vec<MetadataRecord>> {
        let response = self
            .send(self.client.get(self.table_url.clone()).query(&[
                ("resource_id", eq(resource_id)),
                ("identity", eq(identity)),
                ("order", "created_at.desc".to_string()),
            ]))
            .await?;

        Self::rows(response).await
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        let response = self
            .send(self.client.delete(self.table_url.clone()).query(&[("id", eq(id))]))
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Backend(format!("HTTP {status}: {body}")))
        }
    }

    async fn mark_confirmed(&self, id: RecordId, signature: &Signature) -> Result<MetadataRecord> {
        let response = self
            .send(
                self.client
                    .patch(self.table_url.clone())
                    .query(&[("id", eq(id))])
                    .header("Prefer", RETURN_REPRESENTATION)
                    .json(&json!({
                        "status": RecordStatus::Confirmed,
                        "signature": signature.to_string(),
                        "updated_at": Utc::now(),
                    })),
            )
            .await?;

        let updated: Vec<MetadataRecord> = Self::rows(response).await?;
        updated.into_iter().next().ok_or(StoreError::NotFound(id))
    }

    async fn count_for_resource(&self, resource_id: &ResourceId, kind: SubmissionKind) -> Result<u64> {
        let response = self
            .send(self.client.get(self.table_url.clone()).query(&[
                ("resource_id", eq(resource_id)),
                ("kind", eq(kind.as_str())),
                ("select", "id".to_string()),
            ]))
            .await?;

        let rows: Vec<IgnoredAny> = Self::rows(response).await?;
        Ok(rows.len() as u64)
    }
}
