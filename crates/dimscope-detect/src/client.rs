//! HTTP client for the detection service

use std::time::Duration;

use async_trait::async_trait;
use dimscope_types::{Error, MeasureResponse, Result};
use log::{debug, info, warn};
use serde::Serialize;

use crate::payload::ImagePayload;
use crate::response::{interpret_health, interpret_measure_response};
use crate::DetectionClient;

/// Connection settings for the detection service
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// e.g. `http://127.0.0.1:5001`
    pub base_url: String,
    /// Bound for the health probe
    pub health_timeout: Duration,
    /// Bound for measure; `None` keeps the transport default
    pub measure_timeout: Option<Duration>,
    /// Extra attempts after a transport failure on measure
    pub retry_count: u32,
    pub retry_interval: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5001".to_string(),
            health_timeout: Duration::from_secs(3),
            measure_timeout: None,
            retry_count: 0,
            retry_interval: Duration::from_millis(500),
        }
    }
}

impl DetectorConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn with_measure_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.measure_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, count: u32, interval: Duration) -> Self {
        self.retry_count = count;
        self.retry_interval = interval;
        self
    }
}

#[derive(Serialize)]
struct MeasureRequest<'a> {
    image: &'a str,
}

/// [`DetectionClient`] speaking JSON over HTTP
pub struct HttpDetectionClient {
    config: DetectorConfig,
    client: reqwest::Client,
}

impl HttpDetectionClient {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::DetectionUnavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send_measure(&self, body: &MeasureRequest<'_>) -> std::result::Result<(u16, Vec<u8>), reqwest::Error> {
        let mut request = self.client.post(self.endpoint("measure")).json(body);
        if let Some(timeout) = self.config.measure_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        Ok((status, bytes.to_vec()))
    }
}

#[async_trait]
impl DetectionClient for HttpDetectionClient {
    async fn check_health(&self) -> bool {
        let url = self.endpoint("health");

        let response = match self
            .client
            .get(&url)
            .timeout(self.config.health_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Health probe to {} failed: {}", url, e);
                return false;
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => {
                let healthy = interpret_health(status, &body);
                debug!("Health probe to {}: status {} healthy={}", url, status, healthy);
                healthy
            }
            Err(e) => {
                debug!("Health probe body from {} unreadable: {}", url, e);
                false
            }
        }
    }

    async fn measure(&self, image: &ImagePayload) -> MeasureResponse {
        let data_url = image.to_data_url();
        let body = MeasureRequest { image: &data_url };

        info!(
            "Sending {} image ({} bytes) to {}",
            image.mime(),
            image.len(),
            self.endpoint("measure")
        );

        let mut attempt = 0;
        loop {
            match self.send_measure(&body).await {
                Ok((status, bytes)) => {
                    let response = interpret_measure_response(status, &bytes);
                    info!(
                        "Detection finished: success={} results={} ({})",
                        response.success,
                        response.measurements.len(),
                        response.message
                    );
                    return response;
                }
                Err(e) if attempt < self.config.retry_count => {
                    attempt += 1;
                    warn!(
                        "Detection request failed, retrying in {}ms (attempt {}/{}): {}",
                        self.config.retry_interval.as_millis(),
                        attempt,
                        self.config.retry_count,
                        e
                    );
                    tokio::time::sleep(self.config.retry_interval).await;
                }
                Err(e) => {
                    warn!("Detection service unreachable: {}", e);
                    return MeasureResponse::failure(format!(
                        "Detection service unreachable: {}",
                        e
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // nothing listens on the discard port in test environments
    const DEAD_URL: &str = "http://127.0.0.1:9";

    fn tiny_png() -> ImagePayload {
        use image::{ImageFormat, RgbImage};
        let mut buf = std::io::Cursor::new(Vec::new());
        RgbImage::new(1, 1).write_to(&mut buf, ImageFormat::Png).unwrap();
        ImagePayload::from_bytes(buf.into_inner()).unwrap()
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client =
            HttpDetectionClient::new(DetectorConfig::default().with_base_url("http://host:5001/")).unwrap();
        assert_eq!(client.endpoint("health"), "http://host:5001/health");
    }

    #[tokio::test]
    async fn test_health_unreachable_is_false() {
        let config = DetectorConfig::default()
            .with_base_url(DEAD_URL)
            .with_health_timeout(Duration::from_millis(500));
        let client = HttpDetectionClient::new(config).unwrap();
        assert!(!client.check_health().await);
    }

    #[tokio::test]
    async fn test_measure_unreachable_returns_failure_value() {
        let config = DetectorConfig::default()
            .with_base_url(DEAD_URL)
            .with_retries(1, Duration::from_millis(10));
        let client = HttpDetectionClient::new(config).unwrap();

        let response = client.measure(&tiny_png()).await;
        assert!(!response.success);
        assert!(response.measurements.is_empty());
        assert!(response.message.contains("unreachable"));
    }
}
