//! reqwest implementation of [`NebraskaApi`].

use reqwest::header::SET_COOKIE;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::models::*;
use super::{NebraskaApi, RequestEditors, LOGIN_STEP};
use crate::error::ProviderError;

/// HTTP client for a single Nebraska endpoint.
///
/// No retries and no timeouts beyond reqwest's defaults.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpClient {
    /// Create a client for `endpoint`, e.g. `http://localhost:8000`.
    pub fn new(endpoint: Url) -> Result<Self, ProviderError> {
        if endpoint.cannot_be_a_base() {
            return Err(ProviderError::Configuration(format!(
                "endpoint {} cannot be used as a base URL",
                endpoint
            )));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("nebraska-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, endpoint })
    }

    /// The server this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        editors: &RequestEditors,
    ) -> Result<RequestBuilder, ProviderError> {
        let url = self.url(segments);
        debug!(method = method.as_str(), path = url.path(), "nebraska request");
        editors.apply(self.client.request(method, url))
    }

    async fn send_json<T, B>(
        &self,
        step: &str,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        editors: &RequestEditors,
    ) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.request(method, segments, editors)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = check_status(step, request.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn paginate<T: DeserializeOwned>(
        &self,
        step: &str,
        app_id: &str,
        collection: &str,
        page: u32,
        per_page: u32,
        editors: &RequestEditors,
    ) -> Result<T, ProviderError> {
        let request = self
            .request(Method::GET, &["api", "apps", app_id, collection], editors)?
            .query(&[("page", page), ("perpage", per_page)]);
        let response = check_status(step, request.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn delete(
        &self,
        step: &str,
        segments: &[&str],
        editors: &RequestEditors,
    ) -> Result<(), ProviderError> {
        let request = self.request(Method::DELETE, segments, editors)?;
        check_status(step, request.send().await?).await?;
        Ok(())
    }
}

async fn check_status(step: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    warn!(step, status = status.as_u16(), "nebraska returned an error status");
    Err(ProviderError::unexpected_status(step, status.as_u16(), body))
}

const NO_BODY: Option<&()> = None;

#[async_trait::async_trait]
impl NebraskaApi for HttpClient {
    async fn get_config(&self, editors: &RequestEditors) -> Result<ServerConfig, ProviderError> {
        self.send_json("Fetching server config", Method::GET, &["config"], NO_BODY, editors)
            .await
    }

    async fn login_token(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<LoginToken, ProviderError> {
        let url = self.url(&["login", "token"]);
        debug!(path = url.path(), "nebraska login");
        let request = self
            .client
            .post(url)
            .form(&[("username", username), ("password", password.expose_secret())]);
        let response = check_status(LOGIN_STEP, request.send().await?).await?;
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.bytes().await?;
        let mut token: LoginToken = serde_json::from_slice(&bytes)?;
        token.cookie = cookie;
        Ok(token)
    }

    async fn create_app(
        &self,
        config: &AppConfig,
        editors: &RequestEditors,
    ) -> Result<Application, ProviderError> {
        self.send_json("Creating application", Method::POST, &["api", "apps"], Some(config), editors)
            .await
    }

    async fn get_app(
        &self,
        app_id: &str,
        editors: &RequestEditors,
    ) -> Result<Application, ProviderError> {
        self.send_json("Fetching application", Method::GET, &["api", "apps", app_id], NO_BODY, editors)
            .await
    }

    async fn update_app(
        &self,
        app_id: &str,
        config: &AppConfig,
        editors: &RequestEditors,
    ) -> Result<Application, ProviderError> {
        self.send_json(
            "Updating application",
            Method::PUT,
            &["api", "apps", app_id],
            Some(config),
            editors,
        )
        .await
    }

    async fn delete_app(&self, app_id: &str, editors: &RequestEditors) -> Result<(), ProviderError> {
        self.delete("Deleting application", &["api", "apps", app_id], editors)
            .await
    }

    async fn create_channel(
        &self,
        app_id: &str,
        config: &ChannelConfig,
        editors: &RequestEditors,
    ) -> Result<Channel, ProviderError> {
        self.send_json(
            "Creating channel",
            Method::POST,
            &["api", "apps", app_id, "channels"],
            Some(config),
            editors,
        )
        .await
    }

    async fn update_channel(
        &self,
        app_id: &str,
        channel_id: &str,
        config: &ChannelConfig,
        editors: &RequestEditors,
    ) -> Result<Channel, ProviderError> {
        self.send_json(
            "Updating channel",
            Method::PUT,
            &["api", "apps", app_id, "channels", channel_id],
            Some(config),
            editors,
        )
        .await
    }

    async fn delete_channel(
        &self,
        app_id: &str,
        channel_id: &str,
        editors: &RequestEditors,
    ) -> Result<(), ProviderError> {
        self.delete(
            "Deleting channel",
            &["api", "apps", app_id, "channels", channel_id],
            editors,
        )
        .await
    }

    async fn paginate_channels(
        &self,
        app_id: &str,
        page: u32,
        per_page: u32,
        editors: &RequestEditors,
    ) -> Result<ChannelPage, ProviderError> {
        self.paginate("Fetching channels", app_id, "channels", page, per_page, editors)
            .await
    }

    async fn create_group(
        &self,
        app_id: &str,
        config: &GroupConfig,
        editors: &RequestEditors,
    ) -> Result<Group, ProviderError> {
        self.send_json(
            "Creating group",
            Method::POST,
            &["api", "apps", app_id, "groups"],
            Some(config),
            editors,
        )
        .await
    }

    async fn update_group(
        &self,
        app_id: &str,
        group_id: &str,
        config: &GroupConfig,
        editors: &RequestEditors,
    ) -> Result<Group, ProviderError> {
        self.send_json(
            "Updating group",
            Method::PUT,
            &["api", "apps", app_id, "groups", group_id],
            Some(config),
            editors,
        )
        .await
    }

    async fn delete_group(
        &self,
        app_id: &str,
        group_id: &str,
        editors: &RequestEditors,
    ) -> Result<(), ProviderError> {
        self.delete("Deleting group", &["api", "apps", app_id, "groups", group_id], editors)
            .await
    }

    async fn paginate_groups(
        &self,
        app_id: &str,
        page: u32,
        per_page: u32,
        editors: &RequestEditors,
    ) -> Result<GroupPage, ProviderError> {
        self.paginate("Fetching groups", app_id, "groups", page, per_page, editors)
            .await
    }

    async fn create_package(
        &self,
        app_id: &str,
        config: &PackageConfig,
        editors: &RequestEditors,
    ) -> Result<Package, ProviderError> {
        self.send_json(
            "Creating package",
            Method::POST,
            &["api", "apps", app_id, "packages"],
            Some(config),
            editors,
        )
        .await
    }

    async fn update_package(
        &self,
        app_id: &str,
        package_id: &str,
        config: &PackageConfig,
        editors: &RequestEditors,
    ) -> Result<Package, ProviderError> {
        self.send_json(
            "Updating package",
            Method::PUT,
            &["api", "apps", app_id, "packages", package_id],
            Some(config),
            editors,
        )
        .await
    }

    async fn delete_package(
        &self,
        app_id: &str,
        package_id: &str,
        editors: &RequestEditors,
    ) -> Result<(), ProviderError> {
        self.delete(
            "Deleting package",
            &["api", "apps", app_id, "packages", package_id],
            editors,
        )
        .await
    }

    async fn paginate_packages(
        &self,
        app_id: &str,
        page: u32,
        per_page: u32,
        editors: &RequestEditors,
    ) -> Result<PackagePage, ProviderError> {
        self.paginate("Fetching packages", app_id, "packages", page, per_page, editors)
            .await
    }
}
