//! The Nebraska REST API as seen by the provider.
//!
//! [`NebraskaApi`] is the seam between resource logic and transport. The
//! provider talks to it through [`http::HttpClient`]; tests swap in
//! [`crate::testing::FakeNebraska`].

pub mod http;
#[allow(missing_docs)]
pub mod models;

use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

use crate::error::ProviderError;

pub use models::{
    AppConfig, Application, Channel, ChannelConfig, ChannelPage, FlatcarAction,
    FlatcarActionPackage, Group, GroupConfig, GroupPage, LoginToken, Package, PackageConfig,
    PackagePage, Paginated, ServerConfig,
};

/// Step name reported when the login call fails.
pub const LOGIN_STEP: &str = "Fetching login token";

/// A header added to every authenticated request.
#[derive(Debug)]
pub enum RequestEditor {
    /// `Authorization: Bearer <token>`.
    Bearer(SecretString),
    /// `Cookie: <cookie>`, sent verbatim.
    Cookie(SecretString),
}

impl RequestEditor {
    /// Header name and value this editor adds.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            RequestEditor::Bearer(token) => ("authorization", format!("Bearer {}", token.expose_secret())),
            RequestEditor::Cookie(cookie) => ("cookie", cookie.expose_secret().to_string()),
        }
    }
}

/// The ordered set of editors applied to a request.
#[derive(Debug, Default)]
pub struct RequestEditors(Vec<RequestEditor>);

impl RequestEditors {
    /// No decoration at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// A single bearer token.
    pub fn bearer(token: SecretString) -> Self {
        Self(vec![RequestEditor::Bearer(token)])
    }

    /// Append an editor.
    pub fn with(mut self, editor: RequestEditor) -> Self {
        self.0.push(editor);
        self
    }

    /// Whether no editor is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of editors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the editors in application order.
    pub fn iter(&self) -> impl Iterator<Item = &RequestEditor> {
        self.0.iter()
    }

    /// Header pairs in application order. Values contain secrets.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        self.0.iter().map(RequestEditor::header).collect()
    }

    /// Add the headers to a reqwest request, marked sensitive.
    pub fn apply(
        &self,
        mut request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ProviderError> {
        for (name, value) in self.headers() {
            let mut value = HeaderValue::from_str(&value).map_err(|_| {
                ProviderError::Configuration(format!("invalid characters in {} header", name))
            })?;
            value.set_sensitive(true);
            request = request.header(name, value);
        }
        Ok(request)
    }
}

/// Operations the provider needs from a Nebraska server.
///
/// Every call except [`NebraskaApi::login_token`] is decorated with the
/// session's [`RequestEditors`]. Non-success responses surface as
/// [`ProviderError::UnexpectedStatus`].
#[async_trait::async_trait]
pub trait NebraskaApi: Send + Sync {
    /// `GET /config`.
    async fn get_config(&self, editors: &RequestEditors) -> Result<ServerConfig, ProviderError>;

    /// `POST /login/token` with form-encoded credentials.
    async fn login_token(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<LoginToken, ProviderError>;

    /// `POST /api/apps`.
    async fn create_app(
        &self,
        config: &AppConfig,
        editors: &RequestEditors,
    ) -> Result<Application, ProviderError>;

    /// Look up an application by id or product id.
    async fn get_app(
        &self,
        app_id: &str,
        editors: &RequestEditors,
    ) -> Result<Application, ProviderError>;

    /// `PUT /api/apps/{app}`.
    async fn update_app(
        &self,
        app_id: &str,
        config: &AppConfig,
        editors: &RequestEditors,
    ) -> Result<Application, ProviderError>;

    /// `DELETE /api/apps/{app}`.
    async fn delete_app(&self, app_id: &str, editors: &RequestEditors) -> Result<(), ProviderError>;

    /// `POST /api/apps/{app}/channels`.
    async fn create_channel(
        &self,
        app_id: &str,
        config: &ChannelConfig,
        editors: &RequestEditors,
    ) -> Result<Channel, ProviderError>;

    /// `PUT /api/apps/{app}/channels/{channel}`.
    async fn update_channel(
        &self,
        app_id: &str,
        channel_id: &str,
        config: &ChannelConfig,
        editors: &RequestEditors,
    ) -> Result<Channel, ProviderError>;

    /// `DELETE /api/apps/{app}/channels/{channel}`.
    async fn delete_channel(
        &self,
        app_id: &str,
        channel_id: &str,
        editors: &RequestEditors,
    ) -> Result<(), ProviderError>;

    /// `GET /api/apps/{app}/channels?page=&perpage=`.
    async fn paginate_channels(
        &self,
        app_id: &str,
        page: u32,
        per_page: u32,
        editors: &RequestEditors,
    ) -> Result<ChannelPage, ProviderError>;

    /// `POST /api/apps/{app}/groups`.
    async fn create_group(
        &self,
        app_id: &str,
        config: &GroupConfig,
        editors: &RequestEditors,
    ) -> Result<Group, ProviderError>;

    /// `PUT /api/apps/{app}/groups/{group}`.
    async fn update_group(
        &self,
        app_id: &str,
        group_id: &str,
        config: &GroupConfig,
        editors: &RequestEditors,
    ) -> Result<Group, ProviderError>;

    /// `DELETE /api/apps/{app}/groups/{group}`.
    async fn delete_group(
        &self,
        app_id: &str,
        group_id: &str,
        editors: &RequestEditors,
    ) -> Result<(), ProviderError>;

    /// `GET /api/apps/{app}/groups?page=&perpage=`.
    async fn paginate_groups(
        &self,
        app_id: &str,
        page: u32,
        per_page: u32,
        editors: &RequestEditors,
    ) -> Result<GroupPage, ProviderError>;

    /// `POST /api/apps/{app}/packages`.
    async fn create_package(
        &self,
        app_id: &str,
        config: &PackageConfig,
        editors: &RequestEditors,
    ) -> Result<Package, ProviderError>;

    /// `PUT /api/apps/{app}/packages/{package}`.
    async fn update_package(
        &self,
        app_id: &str,
        package_id: &str,
        config: &PackageConfig,
        editors: &RequestEditors,
    ) -> Result<Package, ProviderError>;

    /// `DELETE /api/apps/{app}/packages/{package}`.
    async fn delete_package(
        &self,
        app_id: &str,
        package_id: &str,
        editors: &RequestEditors,
    ) -> Result<(), ProviderError>;

    /// `GET /api/apps/{app}/packages?page=&perpage=`.
    async fn paginate_packages(
        &self,
        app_id: &str,
        page: u32,
        per_page: u32,
        editors: &RequestEditors,
    ) -> Result<PackagePage, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    #[test]
    fn test_no_editors() {
        let editors = RequestEditors::none();
        assert!(editors.is_empty());
        assert!(editors.headers().is_empty());
    }

    #[test]
    fn test_bearer_and_cookie_headers() {
        let editors = RequestEditors::bearer(SecretString::from("session-token"))
            .with(RequestEditor::Cookie(SecretString::from("nebraska_session=abc; Path=/")));

        assert_eq!(editors.len(), 2);
        assert_eq!(
            editors.headers(),
            vec![
                ("authorization", "Bearer session-token".to_string()),
                ("cookie", "nebraska_session=abc; Path=/".to_string()),
            ]
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let editors = RequestEditors::bearer(SecretString::from("ghp_hidden"));
        assert!(!format!("{:?}", editors).contains("ghp_hidden"));
    }

    #[test]
    fn test_apply_sets_headers() {
        let editors = RequestEditors::bearer(SecretString::from("tok"));
        let request = editors
            .apply(reqwest::Client::new().get("http://localhost:8000/config"))
            .unwrap()
            .build()
            .unwrap();

        let value = request.headers().get(AUTHORIZATION).unwrap();
        assert_eq!(value, "Bearer tok");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_apply_rejects_header_injection() {
        let editors = RequestEditors::none().with(RequestEditor::Cookie(SecretString::from("a\nb")));
        let err = editors
            .apply(reqwest::Client::new().get("http://localhost:8000/config"))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
