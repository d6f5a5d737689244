use crate::domain::models::ScheduleMode;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::range_mapper::{BusyTimeBatchRequest, RangeListBody, RangeRecord};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

const BATCH_CREATE_SEGMENT: &str = "batch_create";
const CLEAR_ALL_SEGMENT: &str = "clear_all";

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct BatchCreateResponse {
    #[serde(default)]
    pub created_count: usize,
    #[serde(default)]
    pub total_requested: Option<usize>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// The remote store that owns every member's ranges.
#[async_trait]
pub trait ScheduleClient: Send + Sync {
    async fn list_ranges(
        &self,
        access_token: &str,
        mode: ScheduleMode,
    ) -> Result<Vec<RangeRecord>, InfraError>;

    async fn batch_create_busy(
        &self,
        access_token: &str,
        records: &[RangeRecord],
    ) -> Result<BatchCreateResponse, InfraError>;

    async fn create_availability(
        &self,
        access_token: &str,
        record: &RangeRecord,
    ) -> Result<(), InfraError>;

    async fn clear_all(&self, access_token: &str, mode: ScheduleMode) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestScheduleClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

impl ReqwestScheduleClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| InfraError::InvalidConfig(format!("failed to build http client: {error}")))?;
        Ok(Self { client, base_url })
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Credential(format!("{field} must not be empty")));
        }
        Ok(())
    }

    /// Joins `segments` onto the base URL, keeping the trailing slash the store expects.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("schedule api base URL cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
            path.push("");
        }
        Ok(url)
    }

    fn http_error_message(status: StatusCode, body: &str) -> String {
        let mut message = format!("http {}", status.as_u16());
        let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
            if !body.trim().is_empty() {
                message.push_str(&format!("; body={}", body.trim()));
            }
            return message;
        };
        if let Some(error) = parsed.error.or(parsed.detail) {
            message.push_str(&format!("; {error}"));
        }
        if !parsed.errors.is_empty() {
            message.push_str(&format!("; {}", parsed.errors.join("; ")));
        }
        message
    }

    async fn read_body(
        response: reqwest::Response,
        context: &str,
    ) -> Result<(StatusCode, String), InfraError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Network(format!("failed reading {context} response: {error}")))?;
        Ok((status, body))
    }
}

#[async_trait]
impl ScheduleClient for ReqwestScheduleClient {
    async fn list_ranges(
        &self,
        access_token: &str,
        mode: ScheduleMode,
    ) -> Result<Vec<RangeRecord>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&[mode.collection()])?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("network error while listing {mode} ranges: {error}")))?;
        let (status, body) = Self::read_body(response, "range list").await?;

        if !status.is_success() {
            return Err(InfraError::Fetch(Self::http_error_message(status, &body)));
        }

        let parsed: RangeListBody = serde_json::from_str(&body).map_err(|error| {
            InfraError::Fetch(format!("invalid range list payload: {error}; body={body}"))
        })?;
        Ok(parsed.into_records())
    }

    async fn batch_create_busy(
        &self,
        access_token: &str,
        records: &[RangeRecord],
    ) -> Result<BatchCreateResponse, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&[ScheduleMode::Busy.collection(), BATCH_CREATE_SEGMENT])?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(&BusyTimeBatchRequest { busy_times: records })
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("network error while creating busy times: {error}")))?;
        let (status, body) = Self::read_body(response, "batch create").await?;

        if !status.is_success() {
            return Err(InfraError::Submission(Self::http_error_message(status, &body)));
        }

        serde_json::from_str(&body).map_err(|error| {
            InfraError::Submission(format!("invalid batch create payload: {error}; body={body}"))
        })
    }

    async fn create_availability(
        &self,
        access_token: &str,
        record: &RangeRecord,
    ) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&[ScheduleMode::Availability.collection()])?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(access_token)
            .json(record)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("network error while creating availability: {error}")))?;
        let (status, body) = Self::read_body(response, "availability create").await?;

        if !status.is_success() {
            return Err(InfraError::Submission(Self::http_error_message(status, &body)));
        }
        Ok(())
    }

    async fn clear_all(&self, access_token: &str, mode: ScheduleMode) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let endpoint = self.endpoint(&[mode.collection(), CLEAR_ALL_SEGMENT])?;
        let response = self
            .client
            .delete(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("network error while clearing {mode} ranges: {error}")))?;
        let (status, body) = Self::read_body(response, "clear all").await?;

        if !status.is_success() {
            return Err(InfraError::Submission(Self::http_error_message(status, &body)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ReqwestScheduleClient {
        let base = Url::parse(&format!("{}/api/", server.uri())).expect("mock base url");
        ReqwestScheduleClient::new(base)
    }

    fn record(day: u8, start: &str, end: &str) -> RangeRecord {
        RangeRecord {
            day_of_week: day,
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[tokio::test]
    async fn list_ranges_sends_bearer_token_and_reads_paginated_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/busy-times/"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 1,
                "results": [{"id": 1, "day_of_week": 0, "start_time": "09:00:00", "end_time": "10:00:00"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = client_for(&server)
            .await
            .list_ranges("token-1", ScheduleMode::Busy)
            .await
            .expect("list ranges");
        assert_eq!(records, vec![record(0, "09:00:00", "10:00:00")]);
    }

    #[tokio::test]
    async fn list_ranges_maps_http_failure_to_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/availabilities/"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"detail": "Given token not valid"})),
            )
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .list_ranges("expired", ScheduleMode::Availability)
            .await;
        match result {
            Err(InfraError::Fetch(message)) => {
                assert!(message.contains("http 401"));
                assert!(message.contains("Given token not valid"));
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_create_posts_busy_times_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/busy-times/batch_create/"))
            .and(body_json(serde_json::json!({
                "busy_times": [
                    {"day_of_week": 0, "start_time": "09:00", "end_time": "10:00"},
                    {"day_of_week": 3, "start_time": "23:00", "end_time": "23:59"}
                ]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "created_count": 1,
                "total_requested": 2,
                "errors": ["Item 1: duplicate"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .await
            .batch_create_busy(
                "token",
                &[record(0, "09:00", "10:00"), record(3, "23:00", "23:59")],
            )
            .await
            .expect("batch create");
        assert_eq!(response.created_count, 1);
        assert_eq!(response.total_requested, Some(2));
        assert_eq!(response.errors, vec!["Item 1: duplicate".to_string()]);
    }

    #[tokio::test]
    async fn batch_create_rejection_surfaces_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/busy-times/batch_create/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "Too many busy times in one request. Maximum 100 allowed."
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .batch_create_busy("token", &[record(0, "09:00", "10:00")])
            .await;
        match result {
            Err(InfraError::Submission(message)) => assert!(message.contains("Maximum 100 allowed")),
            other => panic!("expected submission error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn availability_and_clear_all_hit_their_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/availabilities/"))
            .and(body_json(serde_json::json!({
                "day_of_week": 5, "start_time": "10:00", "end_time": "12:00"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 9})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/availabilities/clear_all/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Deleted 1 availability slots"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .create_availability("token", &record(5, "10:00", "12:00"))
            .await
            .expect("create availability");
        client
            .clear_all("token", ScheduleMode::Availability)
            .await
            .expect("clear all");
    }

    #[tokio::test]
    async fn empty_token_is_rejected_before_any_request() {
        let server = MockServer::start().await;
        let result = client_for(&server)
            .await
            .list_ranges("  ", ScheduleMode::Busy)
            .await;
        assert!(matches!(result, Err(InfraError::Credential(_))));
    }
}
