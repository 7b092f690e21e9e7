//! Authentication against a Nebraska server.
//!
//! [`configure_session`] turns a [`ProviderConfig`] into a [`Session`]: it
//! checks that the server runs the requested auth mode and builds the
//! request editors every later call is decorated with.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument};

use crate::api::{NebraskaApi, RequestEditor, RequestEditors};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::types::AuthMode;

/// An authenticated handle on a Nebraska server.
///
/// Built once by [`configure_session`] and never mutated afterwards.
pub struct Session {
    auth_mode: AuthMode,
    editors: RequestEditors,
    api: Arc<dyn NebraskaApi>,
}

impl Session {
    /// The auth mode the session was established with.
    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    /// Headers added to every request.
    pub fn editors(&self) -> &RequestEditors {
        &self.editors
    }

    /// The API the session talks to.
    pub fn api(&self) -> &dyn NebraskaApi {
        self.api.as_ref()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("auth_mode", &self.auth_mode)
            .field("editors", &self.editors)
            .finish_non_exhaustive()
    }
}

/// Establish a session.
///
/// 1. Credentials required by the requested mode must be present.
/// 2. `GET /config` is always fetched, with the bearer token in `github` mode.
/// 3. The server's auth mode must equal the requested one.
/// 4. In `oidc` mode one login call yields the bearer token and session cookie.
///
/// Any failure aborts; no partial session is returned.
#[instrument(skip_all, fields(endpoint = %config.endpoint, auth_mode = %config.auth_mode))]
pub async fn configure_session(
    api: Arc<dyn NebraskaApi>,
    config: &ProviderConfig,
) -> Result<Session, ProviderError> {
    config.check_credentials()?;

    let config_editors = match config.auth_mode {
        AuthMode::Github => RequestEditors::bearer(github_token(config)),
        AuthMode::Noop | AuthMode::Oidc => RequestEditors::none(),
    };
    let server = api.get_config(&config_editors).await?;
    debug!(server_auth_mode = %server.auth_mode, "fetched nebraska server config");

    if server.auth_mode != config.auth_mode.as_str() {
        return Err(ProviderError::Configuration(format!(
            "the Nebraska server {} supports {} and doesn't support {} auth_mode",
            config.endpoint, server.auth_mode, config.auth_mode
        )));
    }

    let editors = match config.auth_mode {
        AuthMode::Noop => RequestEditors::none(),
        AuthMode::Github => config_editors,
        AuthMode::Oidc => {
            let login = api.login_token(&config.username, &config.password).await?;
            if login.token.is_empty() {
                return Err(ProviderError::Configuration(
                    "login succeeded but the server returned no token".to_string(),
                ));
            }
            RequestEditors::bearer(SecretString::from(login.token))
                .with(RequestEditor::Cookie(SecretString::from(login.cookie)))
        },
    };

    info!("nebraska session established");
    Ok(Session {
        auth_mode: config.auth_mode,
        editors,
        api,
    })
}

fn github_token(config: &ProviderConfig) -> SecretString {
    SecretString::from(config.github_token.expose_secret().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeNebraska};
    use serde_json::json;

    fn config(value: serde_json::Value) -> ProviderConfig {
        ProviderConfig::resolve(&value, |_| None).unwrap()
    }

    #[tokio::test]
    async fn test_noop_session_has_no_editors() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let session = configure_session(fake.clone(), &config(json!({}))).await.unwrap();

        assert_eq!(session.auth_mode(), AuthMode::Noop);
        assert!(session.editors().is_empty());
        assert_eq!(fake.calls(), vec![Call::GetConfig]);
        assert!(fake.headers_of(0).is_empty());
    }

    #[tokio::test]
    async fn test_github_session_uses_bearer() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Github));
        let session = configure_session(
            fake.clone(),
            &config(json!({"auth_mode": "github", "github_token": "ghp_123"})),
        )
        .await
        .unwrap();

        assert_eq!(
            session.editors().headers(),
            vec![("authorization", "Bearer ghp_123".to_string())]
        );
        // The config fetch itself is already authenticated.
        assert_eq!(
            fake.headers_of(0),
            vec![("authorization".to_string(), "Bearer ghp_123".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mode_mismatch_fails_before_authenticated_calls() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let err = configure_session(
            fake.clone(),
            &config(json!({"endpoint": "http://nebraska.test:8000", "auth_mode": "github", "github_token": "ghp_123"})),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProviderError::Configuration(_)));
        let message = err.to_string();
        assert!(message.contains("http://nebraska.test:8000"));
        assert!(message.contains("supports noop"));
        assert!(message.contains("doesn't support github"));
        assert_eq!(fake.calls(), vec![Call::GetConfig]);
    }

    #[tokio::test]
    async fn test_missing_credentials_make_no_calls() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Github));
        let err = configure_session(fake.clone(), &config(json!({"auth_mode": "github"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("github_token"));

        let err = configure_session(
            fake.clone(),
            &config(json!({"auth_mode": "oidc", "username": "admin"})),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("password"));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_oidc_session_carries_token_and_cookie() {
        let fake = Arc::new(
            FakeNebraska::new(AuthMode::Oidc).with_login("oidc-token", "nebraska_session=abc; Path=/"),
        );
        let session = configure_session(
            fake.clone(),
            &config(json!({"auth_mode": "oidc", "username": "admin", "password": "pw"})),
        )
        .await
        .unwrap();

        assert_eq!(
            fake.calls(),
            vec![Call::GetConfig, Call::LoginToken("admin".to_string())]
        );
        assert!(fake.headers_of(0).is_empty());

        session
            .api()
            .paginate_groups("app-1", 1, 10, session.editors())
            .await
            .unwrap();
        assert_eq!(
            fake.headers_of(2),
            vec![
                ("authorization".to_string(), "Bearer oidc-token".to_string()),
                ("cookie".to_string(), "nebraska_session=abc; Path=/".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_oidc_login_failure_is_fatal() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Oidc).with_login_failure(401, "bad credentials"));
        let err = configure_session(
            fake.clone(),
            &config(json!({"auth_mode": "oidc", "username": "admin", "password": "nope"})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedStatus { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_oidc_login_without_token_is_fatal() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Oidc).with_login("", "cookie=1"));
        let err = configure_session(
            fake.clone(),
            &config(json!({"auth_mode": "oidc", "username": "admin", "password": "pw"})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_config_fetch_failure_is_fatal() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        fake.fail_next(500, "boom");
        let err = configure_session(fake.clone(), &config(json!({}))).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
