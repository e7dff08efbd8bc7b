//! Gateway authentication client
//!
//! Handles the whole session lifecycle against the gateway: login,
//! restoring a saved session on startup, logout, and the access-request
//! flow for people who don't have an account yet.
//!
//! Role checks here are a UX convenience only. The gateway enforces
//! authorization server-side; nothing in this process is trusted.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, SharedBus};
use crate::error::ClientError;
use crate::models::{
    AccessRequest, AccessRequestOutcome, AccessStatus, AccessStatusResult, Role, User,
};
use crate::session::SessionStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Message shown after a successful access request.
pub const ACCESS_REQUEST_SUBMITTED: &str =
    "Access request submitted successfully. You will receive an email when approved.";

/// Generic user-facing message for transport failures.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please try again.";

/// Message shown when a status check finds the request approved.
pub const ACCESS_APPROVED_MESSAGE: &str = "Your access has been approved! You can now log in.";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessStatusResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the gateway's auth endpoints.
///
/// Cheap to clone; clones share the in-memory user and the session store.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    gateway_url: String,
    store: SessionStore,
    user: Arc<RwLock<Option<User>>>,
    bus: SharedBus,
}

impl AuthClient {
    pub fn new(gateway_url: impl Into<String>, store: SessionStore, bus: SharedBus) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout: {e}, using default");
                reqwest::Client::new()
            });
        Self {
            client,
            gateway_url: gateway_url.into(),
            store,
            user: Arc::new(RwLock::new(None)),
            bus,
        }
    }

    /// Log in with email and password.
    ///
    /// `Ok(true)` means the session is established and persisted;
    /// `Ok(false)` means the gateway rejected the credentials. Transport
    /// problems surface as errors so the caller can distinguish "wrong
    /// password" from "gateway down".
    pub async fn login(&self, email: &str, password: &str) -> Result<bool, ClientError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ClientError::Validation("email"));
        }
        if password.is_empty() {
            return Err(ClientError::Validation("password"));
        }

        let response = self
            .client
            .post(format!("{}/api/auth/login", self.gateway_url))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        // The gateway answers rejections with a JSON envelope, not a bare
        // status code, so parse the body regardless of HTTP status.
        let body: LoginResponse = response.json().await?;
        if !body.success {
            debug!("Login rejected for {email}: {:?}", body.error);
            return Ok(false);
        }
        let (Some(token), Some(user)) = (body.token, body.user) else {
            warn!("Login response missing token or user");
            return Ok(false);
        };

        self.store.save(&token);
        *self.user.write().await = Some(user.clone());
        info!("Logged in as {} ({})", user.email, user.role);
        self.bus.publish(BusEvent::SessionStarted { user });
        Ok(true)
    }

    /// Restore a saved session, if any.
    ///
    /// Returns the user when the stored token is still good. The token is
    /// cleared only when the gateway definitively rejects it; if the
    /// gateway is unreachable the token stays for the next attempt.
    pub async fn validate_session(&self) -> Option<User> {
        let token = self.store.load()?;

        let response = match self
            .client
            .get(format!("{}/api/auth/validate", self.gateway_url))
            .bearer_auth(&token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Session validation unreachable: {e}");
                return None;
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            info!("Stored session rejected by gateway, clearing");
            self.store.clear();
            return None;
        }
        if !status.is_success() {
            warn!("Session validation failed with {status}, keeping token");
            return None;
        }

        let body: ValidateResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to parse validation response: {e}");
                return None;
            }
        };

        if !body.success {
            info!("Stored session no longer valid, clearing");
            self.store.clear();
            return None;
        }
        let Some(user) = body.user else {
            warn!("Validation response missing user, clearing session");
            self.store.clear();
            return None;
        };

        *self.user.write().await = Some(user.clone());
        info!("Session restored for {} ({})", user.email, user.role);
        self.bus
            .publish(BusEvent::SessionStarted { user: user.clone() });
        Some(user)
    }

    /// End the session locally. No gateway call is involved; the token is
    /// simply forgotten on this machine.
    pub async fn logout(&self) {
        self.store.clear();
        *self.user.write().await = None;
        info!("Logged out");
        self.bus.publish(BusEvent::SessionEnded);
    }

    /// Submit an access request for someone without an account.
    ///
    /// Transport failures are folded into the outcome rather than raised,
    /// so the result is always presentable as-is.
    pub async fn request_access(
        &self,
        request: &AccessRequest,
    ) -> Result<AccessRequestOutcome, ClientError> {
        if request.name.trim().is_empty() {
            return Err(ClientError::Validation("name"));
        }
        if request.email.trim().is_empty() {
            return Err(ClientError::Validation("email"));
        }
        if request.reason.trim().is_empty() {
            return Err(ClientError::Validation("reason"));
        }

        let result = self
            .client
            .post(format!("{}/api/auth/request-access", self.gateway_url))
            .json(request)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Access request failed to send: {e}");
                return Ok(AccessRequestOutcome {
                    success: false,
                    message: NETWORK_ERROR_MESSAGE.to_string(),
                });
            }
        };

        let body: EnvelopeResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to parse access request response: {e}");
                return Ok(AccessRequestOutcome {
                    success: false,
                    message: NETWORK_ERROR_MESSAGE.to_string(),
                });
            }
        };

        if body.success {
            info!("Access request submitted for {}", request.email);
            Ok(AccessRequestOutcome {
                success: true,
                message: ACCESS_REQUEST_SUBMITTED.to_string(),
            })
        } else {
            Ok(AccessRequestOutcome {
                success: false,
                message: body
                    .error
                    .unwrap_or_else(|| "Failed to submit access request".to_string()),
            })
        }
    }

    /// Look up where a previously submitted access request stands.
    pub async fn check_access_status(&self, email: &str) -> AccessStatusResult {
        let email = email.trim();
        if email.is_empty() {
            return AccessStatusResult {
                status: AccessStatus::Error,
                message: Some("Please enter your email address.".to_string()),
            };
        }

        let url = format!(
            "{}/api/auth/access-status?email={}",
            self.gateway_url,
            urlencoding::encode(email)
        );
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Access status check failed: {e}");
                return AccessStatusResult {
                    status: AccessStatus::Error,
                    message: Some(NETWORK_ERROR_MESSAGE.to_string()),
                };
            }
        };

        let body: AccessStatusResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to parse access status response: {e}");
                return AccessStatusResult {
                    status: AccessStatus::Error,
                    message: Some(NETWORK_ERROR_MESSAGE.to_string()),
                };
            }
        };

        if body.success {
            let status = body
                .status
                .as_deref()
                .map(AccessStatus::from)
                .unwrap_or_default();
            // An approved result always carries the ready-to-log-in copy;
            // other statuses pass the backend's message through.
            let message = if status == AccessStatus::Approved {
                Some(ACCESS_APPROVED_MESSAGE.to_string())
            } else {
                body.message
            };
            AccessStatusResult { status, message }
        } else {
            AccessStatusResult {
                status: AccessStatus::Error,
                message: Some(
                    body.error
                        .unwrap_or_else(|| "Failed to check access status".to_string()),
                ),
            }
        }
    }

    pub async fn current_user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    pub async fn role(&self) -> Option<Role> {
        self.user.read().await.as_ref().map(|u| u.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::create_bus;

    fn client_with_dir(dir: &std::path::Path) -> AuthClient {
        AuthClient::new(
            "http://localhost:9",
            SessionStore::with_dir(dir),
            create_bus(),
        )
    }

    #[tokio::test]
    async fn test_login_rejects_blank_credentials_before_any_network() {
        let dir = tempfile::tempdir().unwrap();
        let auth = client_with_dir(dir.path());

        let err = auth.login("   ", "secret").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation("email")));

        let err = auth.login("ops@example.com", "").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation("password")));

        assert_eq!(auth.current_user().await, None);
    }

    #[tokio::test]
    async fn test_request_access_rejects_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let auth = client_with_dir(dir.path());

        let request = AccessRequest {
            name: "".to_string(),
            email: "guest@example.com".to_string(),
            reason: "seasonal staff".to_string(),
            organization: None,
            phone: None,
        };
        let err = auth.request_access(&request).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation("name")));
    }

    #[tokio::test]
    async fn test_check_access_status_requires_email() {
        let dir = tempfile::tempdir().unwrap();
        let auth = client_with_dir(dir.path());

        let result = auth.check_access_status("  ").await;
        assert_eq!(result.status, AccessStatus::Error);
        assert_eq!(
            result.message.as_deref(),
            Some("Please enter your email address.")
        );
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_user_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::with_dir(dir.path());
        store.save("tok-123");

        let bus = create_bus();
        let mut events = bus.subscribe();
        let auth = AuthClient::new("http://localhost:9", store.clone(), bus);

        auth.logout().await;

        assert_eq!(store.load(), None);
        assert_eq!(auth.current_user().await, None);
        assert!(matches!(events.try_recv(), Ok(BusEvent::SessionEnded)));
    }

    #[tokio::test]
    async fn test_validate_without_stored_token_skips_gateway() {
        let dir = tempfile::tempdir().unwrap();
        // Gateway URL points at a closed port; reaching it would error loudly.
        let auth = client_with_dir(dir.path());
        assert_eq!(auth.validate_session().await, None);
    }
}
