#[cfg(test)]
mod tests;

use std::fmt;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use super::auth::ZohoAuth;
use crate::config::Config;
use crate::{Result, ZohoError};

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
    Patch,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        })
    }
}

/// Blocking HTTP client for the Zoho Creator REST API
#[derive(Debug)]
pub struct ApiClient {
    base_url: Url,
    auth: ZohoAuth,
    agent: ureq::Agent,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl ApiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config.zoho.api_base_url()?;
        let timeout = Duration::from_secs(config.server.request_timeout_seconds);

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        let auth = ZohoAuth::new(&config.zoho, agent.clone())?;

        Ok(Self {
            base_url,
            auth,
            agent,
            retry_attempts: config.server.retry_attempts.max(1),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Base delay of the exponential backoff between retries
    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn auth(&self) -> &ZohoAuth {
        &self.auth
    }

    /// Build an API URL from path segments, percent-encoding each one
    #[inline]
    pub fn url_for(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ZohoError::Config(format!("Invalid API base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    #[inline]
    pub fn get(&self, segments: &[&str], query: &[(&str, String)]) -> Result<String> {
        let mut url = self.url_for(segments)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        self.execute(Method::Get, &url, None)
    }

    #[inline]
    pub fn post_json(&self, segments: &[&str], body: &serde_json::Value) -> Result<String> {
        let url = self.url_for(segments)?;
        let body = serde_json::to_string(body)?;
        self.execute(Method::Post, &url, Some(&body))
    }

    #[inline]
    pub fn patch_json(&self, segments: &[&str], body: &serde_json::Value) -> Result<String> {
        let url = self.url_for(segments)?;
        let body = serde_json::to_string(body)?;
        self.execute(Method::Patch, &url, Some(&body))
    }

    fn execute(&self, method: Method, url: &Url, body: Option<&str>) -> Result<String> {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!(
                "{} {} attempt {}/{}",
                method, url, attempt, self.retry_attempts
            );

            match self.send_authorized(method, url, body)? {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let retry_error = match error {
                        ureq::Error::StatusCode(status) if status >= 500 || status == 429 => {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, self.retry_attempts
                            );
                            ZohoError::Api {
                                status,
                                message: format!("{} {}", method, url.path()),
                            }
                        }
                        ureq::Error::StatusCode(404) => {
                            return Err(ZohoError::NotFound(url.path().to_string()));
                        }
                        ureq::Error::StatusCode(status) => {
                            warn!("Client error (status {}), not retrying", status);
                            return Err(ZohoError::Api {
                                status,
                                message: format!("{} {}", method, url.path()),
                            });
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            ZohoError::Network(error.to_string())
                        }
                        other => {
                            warn!("Non-retryable error: {}", other);
                            return Err(ZohoError::Network(other.to_string()));
                        }
                    };

                    last_error = Some(retry_error);

                    if attempt < self.retry_attempts {
                        let delay = self.retry_delay * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for {} {}", method, url);

        Err(last_error
            .unwrap_or_else(|| ZohoError::Network("Request failed after retries".to_string())))
    }

    /// Send once with fresh headers; a 401 drops the token and is replayed once.
    /// The outer result carries authentication failures, the inner one HTTP failures.
    fn send_authorized(
        &self,
        method: Method,
        url: &Url,
        body: Option<&str>,
    ) -> Result<std::result::Result<String, ureq::Error>> {
        let headers = self.auth.authorized_headers()?;
        match self.dispatch(method, url, &headers, body) {
            Err(ureq::Error::StatusCode(401)) => {
                warn!("Access token rejected, refreshing and retrying");
                self.auth.invalidate();
                let headers = self.auth.authorized_headers()?;
                Ok(self.dispatch(method, url, &headers, body))
            }
            other => Ok(other),
        }
    }

    fn dispatch(
        &self,
        method: Method,
        url: &Url,
        headers: &[(&'static str, String)],
        body: Option<&str>,
    ) -> std::result::Result<String, ureq::Error> {
        let response = match method {
            Method::Get => {
                let mut request = self.agent.get(url.as_str());
                for (name, value) in headers {
                    request = request.header(*name, value.as_str());
                }
                request.call()
            }
            Method::Post | Method::Patch => {
                let mut request = if method == Method::Post {
                    self.agent.post(url.as_str())
                } else {
                    self.agent.patch(url.as_str())
                };
                for (name, value) in headers {
                    request = request.header(*name, value.as_str());
                }
                // only requests with a body declare a content type
                request
                    .header("Content-Type", "application/json")
                    .send(body.unwrap_or("{}"))
            }
        };

        response.and_then(|mut resp| resp.body_mut().read_to_string())
    }
}
