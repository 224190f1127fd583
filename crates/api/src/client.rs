//! HTTP client for the approval backend.
//!
//! Every mutation is a bearer-authenticated JSON request; 401-class answers
//! map to [`ApiError::Unauthorized`] so the auth collaborator can force
//! re-login upstream.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use procura_core::{LineItemId, RequestId};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::wire::{
    ApprovalBatch, AssignCoPayload, AssignIrq1Payload, GroupCommentPayload, PriceUpdate,
    RawLineItem, StatementOfNeedRequest,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session token was rejected by the backend")]
    Unauthorized,
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("response decode failure: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ApiError::Decode(error.to_string())
        } else {
            ApiError::Transport(error.to_string())
        }
    }
}

/// Backend contract for the approval table. One method per endpoint; the
/// dispatcher only ever talks to this trait, so tests script it.
#[async_trait]
pub trait ApprovalBackend: Send + Sync {
    /// `GET /api/getApprovalData[?ID=]`: all line items, or one request.
    async fn get_approval_data(
        &self,
        scope: Option<&RequestId>,
    ) -> Result<Vec<RawLineItem>, ApiError>;

    /// `POST /api/approveRequest`: batched approval.
    async fn approve_requests(&self, batch: &ApprovalBatch) -> Result<(), ApiError>;

    /// `POST /api/denyRequest`: batched denial.
    async fn deny_requests(&self, batch: &ApprovalBatch) -> Result<(), ApiError>;

    /// `POST /api/add_comments`: bulk comment submission for one group.
    async fn add_comments(&self, payload: &GroupCommentPayload) -> Result<(), ApiError>;

    /// `PUT /api/cyberSecRelated/{itemId}`: flag one item. Idempotent: the
    /// backend always sets the flag true.
    async fn flag_cyber_sec(&self, item_id: &LineItemId) -> Result<(), ApiError>;

    /// `POST /api/assignIRQ1_ID`: assign the external reference, once.
    async fn assign_irq1_id(&self, payload: &AssignIrq1Payload) -> Result<(), ApiError>;

    /// `POST /api/assignCO`: assign a contracting officer.
    async fn assign_co(&self, payload: &AssignCoPayload) -> Result<(), ApiError>;

    /// `POST /api/updatePrices`: persist a unit-price edit; a rejection
    /// triggers the client-side rollback.
    async fn update_prices(&self, update: &PriceUpdate) -> Result<(), ApiError>;

    /// `POST /api/downloadStatementOfNeedForm`: returns the PDF bytes.
    async fn download_statement_of_need(
        &self,
        request: &StatementOfNeedRequest,
    ) -> Result<Vec<u8>, ApiError>;
}

#[async_trait]
impl<B: ApprovalBackend + ?Sized> ApprovalBackend for Arc<B> {
    async fn get_approval_data(
        &self,
        scope: Option<&RequestId>,
    ) -> Result<Vec<RawLineItem>, ApiError> {
        self.as_ref().get_approval_data(scope).await
    }

    async fn approve_requests(&self, batch: &ApprovalBatch) -> Result<(), ApiError> {
        self.as_ref().approve_requests(batch).await
    }

    async fn deny_requests(&self, batch: &ApprovalBatch) -> Result<(), ApiError> {
        self.as_ref().deny_requests(batch).await
    }

    async fn add_comments(&self, payload: &GroupCommentPayload) -> Result<(), ApiError> {
        self.as_ref().add_comments(payload).await
    }

    async fn flag_cyber_sec(&self, item_id: &LineItemId) -> Result<(), ApiError> {
        self.as_ref().flag_cyber_sec(item_id).await
    }

    async fn assign_irq1_id(&self, payload: &AssignIrq1Payload) -> Result<(), ApiError> {
        self.as_ref().assign_irq1_id(payload).await
    }

    async fn assign_co(&self, payload: &AssignCoPayload) -> Result<(), ApiError> {
        self.as_ref().assign_co(payload).await
    }

    async fn update_prices(&self, update: &PriceUpdate) -> Result<(), ApiError> {
        self.as_ref().update_prices(update).await
    }

    async fn download_statement_of_need(
        &self,
        request: &StatementOfNeedRequest,
    ) -> Result<Vec<u8>, ApiError> {
        self.as_ref().download_statement_of_need(request).await
    }
}

pub struct HttpApprovalClient {
    base_url: String,
    bearer_token: SecretString,
    client: reqwest::Client,
}

impl HttpApprovalClient {
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        Ok(Self { base_url: base_url.into().trim_end_matches('/').to_string(), bearer_token, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let correlation_id = Uuid::new_v4().to_string();
        debug!(
            event_name = "api.request",
            correlation_id = %correlation_id,
            method = %method,
            path,
            "issuing backend request"
        );
        self.client
            .request(method, self.url(path))
            .bearer_auth(self.bearer_token.expose_secret())
            .header("x-correlation-id", correlation_id)
    }

    async fn expect_ok(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }

        let message = response.text().await.unwrap_or_default();
        Err(ApiError::Status { status: status.as_u16(), message })
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), ApiError> {
        let response = self.request(reqwest::Method::POST, path).json(body).send().await?;
        Self::expect_ok(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ApprovalBackend for HttpApprovalClient {
    async fn get_approval_data(
        &self,
        scope: Option<&RequestId>,
    ) -> Result<Vec<RawLineItem>, ApiError> {
        let mut request = self.request(reqwest::Method::GET, "/api/getApprovalData");
        if let Some(request_id) = scope {
            request = request.query(&[("ID", request_id.0.as_str())]);
        }

        let response = Self::expect_ok(request.send().await?).await?;
        let rows: Vec<RawLineItem> = response.json().await?;
        info!(event_name = "api.approval_data_fetched", rows = rows.len(), "fetched line items");
        Ok(rows)
    }

    async fn approve_requests(&self, batch: &ApprovalBatch) -> Result<(), ApiError> {
        self.post_json("/api/approveRequest", batch).await
    }

    async fn deny_requests(&self, batch: &ApprovalBatch) -> Result<(), ApiError> {
        self.post_json("/api/denyRequest", batch).await
    }

    async fn add_comments(&self, payload: &GroupCommentPayload) -> Result<(), ApiError> {
        self.post_json("/api/add_comments", payload).await
    }

    async fn flag_cyber_sec(&self, item_id: &LineItemId) -> Result<(), ApiError> {
        let path = format!("/api/cyberSecRelated/{}", item_id.0);
        let response = self.request(reqwest::Method::PUT, &path).send().await?;
        Self::expect_ok(response).await?;
        Ok(())
    }

    async fn assign_irq1_id(&self, payload: &AssignIrq1Payload) -> Result<(), ApiError> {
        self.post_json("/api/assignIRQ1_ID", payload).await
    }

    async fn assign_co(&self, payload: &AssignCoPayload) -> Result<(), ApiError> {
        self.post_json("/api/assignCO", payload).await
    }

    async fn update_prices(&self, update: &PriceUpdate) -> Result<(), ApiError> {
        self.post_json("/api/updatePrices", update).await
    }

    async fn download_statement_of_need(
        &self,
        request: &StatementOfNeedRequest,
    ) -> Result<Vec<u8>, ApiError> {
        let response = self
            .request(reqwest::Method::POST, "/api/downloadStatementOfNeedForm")
            .json(request)
            .send()
            .await?;
        let response = Self::expect_ok(response).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::HttpApprovalClient;

    #[test]
    fn base_url_joins_without_a_double_slash() {
        let client = HttpApprovalClient::new(
            "https://procurement.example/",
            SecretString::from("tok".to_string()),
            Duration::from_secs(5),
        )
        .expect("client should build");

        assert_eq!(
            client.url("/api/getApprovalData"),
            "https://procurement.example/api/getApprovalData"
        );
    }
}
