
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Environment, ZohoConfig};
use crate::{Result, ZohoError};

/// Tokens this close to expiry are refreshed before use
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Zoho access tokens live for an hour when `expires_in` is absent
const DEFAULT_TOKEN_LIFETIME_SECONDS: u64 = 3600;

/// OAuth refresh-token authentication against the Zoho accounts server
#[derive(Debug)]
pub struct ZohoAuth {
    token_url: Url,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    environment: Environment,
    agent: ureq::Agent,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    api_domain: Option<String>,
    error: Option<String>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_at
            .checked_duration_since(Instant::now())
            .is_some_and(|left| left > TOKEN_EXPIRY_MARGIN)
    }
}

impl ZohoAuth {
    #[inline]
    pub fn new(config: &ZohoConfig, agent: ureq::Agent) -> Result<Self> {
        config.require_credentials()?;

        Ok(Self {
            token_url: config.token_url()?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            environment: config.environment,
            agent,
            token: Mutex::new(None),
        })
    }

    /// Current access token, refreshed when missing or about to expire
    #[inline]
    pub fn access_token(&self) -> Result<String> {
        let cached = self
            .lock_token()
            .as_ref()
            .filter(|token| token.is_fresh())
            .map(|token| token.value.clone());
        if let Some(value) = cached {
            return Ok(value);
        }

        let token = self.refresh()?;
        let value = token.value.clone();
        *self.lock_token() = Some(token);
        Ok(value)
    }

    /// Headers every Creator API call carries
    #[inline]
    pub fn authorized_headers(&self) -> Result<Vec<(&'static str, String)>> {
        let token = self.access_token()?;

        let mut headers = vec![("Authorization", format!("Zoho-oauthtoken {}", token))];
        if let Some(environment) = self.environment.header_value() {
            headers.push(("environment", environment.to_string()));
        }

        Ok(headers)
    }

    /// Forget the cached token so the next call refreshes it
    #[inline]
    pub fn invalidate(&self) {
        debug!("Invalidating cached Zoho access token");
        *self.lock_token() = None;
    }

    fn lock_token(&self) -> MutexGuard<'_, Option<AccessToken>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self) -> Result<AccessToken> {
        debug!("Refreshing Zoho access token at {}", self.token_url);

        let form = [
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let body = match self.agent.post(self.token_url.as_str()).send_form(form) {
            Ok(mut response) => response
                .body_mut()
                .read_to_string()
                .map_err(|e| ZohoError::Network(format!("Failed to read token response: {}", e)))?,
            Err(ureq::Error::StatusCode(status)) => {
                warn!("Token refresh rejected with HTTP {}", status);
                return Err(ZohoError::Auth(format!(
                    "Token endpoint returned HTTP {}",
                    status
                )));
            }
            Err(e) => {
                return Err(ZohoError::Network(format!(
                    "Failed to reach Zoho accounts server: {}",
                    e
                )));
            }
        };

        let response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ZohoError::Parse(format!("Invalid token response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(ZohoError::Auth(format!("Token refresh failed: {}", error)));
        }

        let value = response
            .access_token
            .ok_or_else(|| ZohoError::Auth("Token response has no access_token".to_string()))?;
        let lifetime = response
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS);

        info!(
            "Obtained Zoho access token (expires in {}s, api domain {})",
            lifetime,
            response.api_domain.as_deref().unwrap_or("unknown")
        );

        Ok(AccessToken {
            value,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        })
    }
}
