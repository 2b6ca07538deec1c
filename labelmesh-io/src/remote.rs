//! HTTP client for the remote segmentation service
//!
//! The service exposes two upload flows that both take the mesh file as a
//! multipart `file` part:
//!
//! - label prediction, answering `{"labels": [...]}` with one class per point
//! - segmentation, which prepares a labelled, downsampled VTP result that is
//!   then fetched from a fixed resource

use crate::download::ResultFile;
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const PREDICT_LABELS_PATH: &str = "/model/upload-file-predict-labels/";
pub const SEGMENT_PATH: &str = "/model/upload-file-segment-downsampling-refined/";
pub const RESULT_PATH: &str = "/model/vtp-file";

/// Errors raised while talking to the prediction service
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: StatusCode },

    #[error("Invalid response from service: {0}")]
    InvalidResponse(String),

    #[error("Invalid service URL {0:?}")]
    InvalidUrl(String),
}

/// Prediction service connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Body of a label prediction answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub labels: Vec<u32>,
}

/// Decode a label prediction body
pub fn parse_predict_response(body: &[u8]) -> Result<PredictResponse, NetworkError> {
    serde_json::from_slice(body).map_err(|e| NetworkError::InvalidResponse(e.to_string()))
}

pub struct PredictionClient {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl PredictionClient {
    pub fn new(config: RemoteConfig) -> Result<Self, NetworkError> {
        // Reject a bad base URL up front rather than on first use
        Url::parse(&config.base_url).map_err(|_| NetworkError::InvalidUrl(config.base_url.clone()))?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Full URL of a service path
    pub fn endpoint(&self, path: &str) -> Result<Url, NetworkError> {
        let joined = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|_| NetworkError::InvalidUrl(joined))
    }

    /// Upload a mesh and receive one class label per point
    pub async fn predict_labels(&self, file_name: &str, bytes: Vec<u8>) -> Result<Vec<u32>, NetworkError> {
        let url = self.endpoint(PREDICT_LABELS_PATH)?;
        info!("Requesting label prediction for {} ({} bytes)", file_name, bytes.len());
        let body = self.upload(url, file_name, bytes).await?;
        let response = parse_predict_response(&body)?;
        debug!("Service returned {} labels", response.labels.len());
        Ok(response.labels)
    }

    /// Upload a mesh for segmentation; the result is retrieved separately
    /// with [`fetch_result`](Self::fetch_result)
    pub async fn request_segmentation(&self, file_name: &str, bytes: Vec<u8>) -> Result<(), NetworkError> {
        let url = self.endpoint(SEGMENT_PATH)?;
        info!("Requesting segmentation for {} ({} bytes)", file_name, bytes.len());
        self.upload(url, file_name, bytes).await?;
        Ok(())
    }

    /// Download the most recent segmentation result
    pub async fn fetch_result(&self) -> Result<ResultFile, NetworkError> {
        let url = self.endpoint(RESULT_PATH)?;
        let response = self.client.get(url.clone()).send().await?;
        let response = check_status(&url, response)?;
        let bytes = response.bytes().await?;
        debug!("Fetched {} byte result from {}", bytes.len(), url);
        Ok(ResultFile::new(bytes.to_vec()))
    }

    /// Segmentation upload followed by the result download
    pub async fn segment_and_fetch(&self, file_name: &str, bytes: Vec<u8>) -> Result<ResultFile, NetworkError> {
        self.request_segmentation(file_name, bytes).await?;
        self.fetch_result().await
    }

    async fn upload(&self, url: Url, file_name: &str, bytes: Vec<u8>) -> Result<Vec<u8>, NetworkError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        let response = self.client.post(url.clone()).multipart(form).send().await?;
        let response = check_status(&url, response)?;
        Ok(response.bytes().await?.to_vec())
    }
}

fn check_status(url: &Url, response: reqwest::Response) -> Result<reqwest::Response, NetworkError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(NetworkError::Status {
            url: url.to_string(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_response_parsing() {
        let response = parse_predict_response(br#"{"labels": [0, 3, 14, 3]}"#).unwrap();
        assert_eq!(response.labels, vec![0, 3, 14, 3]);

        for body in [&b"{}"[..], b"{\"labels\": [1, -2]}", b"not json"] {
            assert!(matches!(
                parse_predict_response(body),
                Err(NetworkError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn test_endpoints_join_base_url() {
        let client = PredictionClient::new(RemoteConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..RemoteConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint(RESULT_PATH).unwrap().as_str(),
            "http://localhost:9000/model/vtp-file"
        );
        assert_eq!(
            client.endpoint(PREDICT_LABELS_PATH).unwrap().as_str(),
            "http://localhost:9000/model/upload-file-predict-labels/"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = PredictionClient::new(RemoteConfig {
            base_url: "not a url".to_string(),
            ..RemoteConfig::default()
        });
        assert!(matches!(result, Err(NetworkError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_request_error() {
        // Port 9 (discard) is closed on test machines
        let client = PredictionClient::new(RemoteConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let result = client.fetch_result().await;
        assert!(matches!(result, Err(NetworkError::Request(_))));
    }
}
