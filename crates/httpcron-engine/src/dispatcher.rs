//! The HTTP Dispatcher: one shared `reqwest::Client` and a deterministic,
//! first-match-wins error classification table.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use httpcron_core::model::{ErrorType, HttpMethod};
use httpcron_core::Clock;

/// Outcome of one dispatched attempt.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status_code: Option<i32>,
    pub latency_ms: f64,
    pub response_size_bytes: i64,
    pub error_type: Option<ErrorType>,
    pub error_message: Option<String>,
    pub started_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.error_type.is_none()
    }
}

/// Wraps a single shared `reqwest::Client` plus the response-size cap.
pub struct HttpDispatcher {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl HttpDispatcher {
    pub fn new(max_response_bytes: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            max_response_bytes,
        }
    }

    pub fn with_client(client: reqwest::Client, max_response_bytes: usize) -> Self {
        Self {
            client,
            max_response_bytes,
        }
    }

    /// Dispatches one request and classifies the result.
    #[allow(clippy::too_many_arguments)]
    pub async fn dispatch(
        &self,
        clock: &dyn Clock,
        url: &str,
        method: HttpMethod,
        headers: Option<&HashMap<String, String>>,
        body: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Outcome {
        let started_at = clock.now();
        let wall_start = Instant::now();

        let mut request = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
            HttpMethod::Patch => self.client.patch(url),
            HttpMethod::Delete => self.client.delete(url),
        };

        request = request.timeout(timeout);

        let mut has_content_type = false;
        if let Some(headers) = headers {
            for (key, value) in headers {
                if key.eq_ignore_ascii_case("content-type") {
                    has_content_type = true;
                }
                request = request.header(key, value);
            }
        }

        request = match body {
            Some(body) => {
                if !has_content_type {
                    request = request.header("Content-Type", "application/json");
                }
                request.json(body)
            }
            None => request,
        };

        let send_result = request.send().await;
        let latency_ms = wall_start.elapsed().as_secs_f64() * 1000.0;

        match send_result {
            Ok(response) => {
                let status = response.status().as_u16() as i32;
                let body_bytes = match response.bytes().await {
                    Ok(bytes) => bytes,
                    Err(_) => {
                        let completed_at = clock.now();
                        return Outcome {
                            status_code: None,
                            latency_ms,
                            response_size_bytes: 0,
                            error_type: Some(ErrorType::Unknown),
                            error_message: Some("failed to read response body".to_string()),
                            started_at,
                            completed_at,
                        };
                    }
                };

                let completed_at = clock.now();

                if body_bytes.len() > self.max_response_bytes {
                    return Outcome {
                        status_code: Some(status),
                        latency_ms,
                        response_size_bytes: body_bytes.len() as i64,
                        error_type: Some(ErrorType::Unknown),
                        error_message: Some("response too large".to_string()),
                        started_at,
                        completed_at,
                    };
                }

                let (error_type, error_message) = classify_status(status);

                Outcome {
                    status_code: Some(status),
                    latency_ms,
                    response_size_bytes: body_bytes.len() as i64,
                    error_type,
                    error_message,
                    started_at,
                    completed_at,
                }
            }
            Err(err) => {
                let completed_at = clock.now();
                let (error_type, error_message) = classify_transport_error(&err);
                Outcome {
                    status_code: None,
                    latency_ms,
                    response_size_bytes: 0,
                    error_type: Some(error_type),
                    error_message: Some(error_message),
                    started_at,
                    completed_at,
                }
            }
        }
    }
}

/// First-match-wins classification for a completed HTTP response.
fn classify_status(status: i32) -> (Option<ErrorType>, Option<String>) {
    if (200..400).contains(&status) {
        (None, None)
    } else if (400..500).contains(&status) {
        (
            Some(ErrorType::Http4xx),
            Some(format!("HTTP {}", status)),
        )
    } else if (500..600).contains(&status) {
        (
            Some(ErrorType::Http5xx),
            Some(format!("HTTP {}", status)),
        )
    } else {
        (
            Some(ErrorType::Unknown),
            Some(format!("unexpected status code {}", status)),
        )
    }
}

/// First-match-wins classification for a `reqwest` transport failure: timeout,
/// DNS resolution, connect/TLS, falling through to `unknown`.
fn classify_transport_error(err: &reqwest::Error) -> (ErrorType, String) {
    if err.is_timeout() {
        return (ErrorType::Timeout, "request timed out".to_string());
    }

    if err.is_connect() {
        let message = err.to_string();
        if is_dns_failure(&message) {
            return (ErrorType::Dns, message);
        }
        return (ErrorType::Connection, message);
    }

    (ErrorType::Unknown, err.to_string())
}

/// `reqwest`/hyper surface DNS failures as connect errors; the underlying
/// `hickory-resolver`/`getaddrinfo` message is the only signal available.
fn is_dns_failure(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("dns")
        || lowered.contains("name resolution")
        || lowered.contains("nodename nor servname")
        || lowered.contains("temporary failure in name resolution")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_2xx_and_3xx_as_success() {
        assert_eq!(classify_status(200), (None, None));
        assert_eq!(classify_status(204), (None, None));
        assert_eq!(classify_status(301), (None, None));
        assert_eq!(classify_status(399), (None, None));
    }

    #[test]
    fn classifies_4xx_as_http_4xx() {
        let (error_type, message) = classify_status(404);
        assert_eq!(error_type, Some(ErrorType::Http4xx));
        assert!(message.unwrap().contains("404"));
    }

    #[test]
    fn classifies_5xx_as_http_5xx() {
        let (error_type, _) = classify_status(503);
        assert_eq!(error_type, Some(ErrorType::Http5xx));
    }

    #[test]
    fn classifies_out_of_range_status_as_unknown() {
        let (error_type, _) = classify_status(101);
        assert_eq!(error_type, Some(ErrorType::Unknown));
    }

    #[test]
    fn recognizes_dns_failure_messages() {
        assert!(is_dns_failure("dns error: failed to lookup address"));
        assert!(is_dns_failure(
            "name resolution failed for host example.test"
        ));
        assert!(!is_dns_failure("connection refused"));
    }
}
