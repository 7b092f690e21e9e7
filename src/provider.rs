//! The provider surface.
//!
//! [`ProviderService`] is the trait a host adapter drives. It speaks JSON
//! attribute bags so the adapter never needs to know about typed states.
//! [`NebraskaProvider`] implements it for the four Nebraska entities.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use url::Url;

use crate::api::http::HttpClient;
use crate::api::{NebraskaApi, LOGIN_STEP};
use crate::auth::{configure_session, Session};
use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::resources::{
    application, channel, group, package, parse_state, state_value, ApplicationResource,
    ChannelResource, GroupResource, PackageResource, ResourceHandler,
};
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::types::ProviderMetadata;
use crate::validation;

/// Operations a host adapter calls on a provider.
///
/// # Example
///
/// ```ignore
/// use nebraska_provider::{NebraskaProvider, ProviderService};
/// use serde_json::json;
///
/// let provider = NebraskaProvider::new();
/// provider.configure(json!({"endpoint": "http://localhost:8000"})).await?;
/// let app = provider
///     .read_data_source("nebraska_application", json!({"product_id": "io.kinvolk.Flatcar"}))
///     .await?;
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return the resource and data source type names.
    /// By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    /// Returns diagnostics (errors and warnings).
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    /// Returns diagnostics (errors and warnings).
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read data from an external source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// Builds the API client for a configured endpoint.
pub trait Connect: Send + Sync + 'static {
    /// Return an API handle for `endpoint`.
    fn connect(&self, endpoint: &Url) -> ProviderResult<Arc<dyn NebraskaApi>>;
}

/// Connects over HTTP with [`HttpClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connect for HttpConnector {
    fn connect(&self, endpoint: &Url) -> ProviderResult<Arc<dyn NebraskaApi>> {
        Ok(Arc::new(HttpClient::new(endpoint.clone())?))
    }
}

/// An existing API handle, used regardless of the endpoint.
impl<A: NebraskaApi + 'static> Connect for Arc<A> {
    fn connect(&self, _endpoint: &Url) -> ProviderResult<Arc<dyn NebraskaApi>> {
        Ok(self.clone())
    }
}

/// Run `$body` with `$handler` bound to the handler for `$type_name`.
macro_rules! dispatch {
    ($type_name:expr, $handler:ident => $body:expr) => {
        match $type_name {
            application::TYPE_NAME => {
                let $handler = ApplicationResource;
                $body
            },
            channel::TYPE_NAME => {
                let $handler = ChannelResource;
                $body
            },
            group::TYPE_NAME => {
                let $handler = GroupResource;
                $body
            },
            package::TYPE_NAME => {
                let $handler = PackageResource;
                $body
            },
            other => Err(ProviderError::UnknownResource(other.to_string())),
        }
    };
}

/// The Nebraska provider.
///
/// Resource operations fail with [`ProviderError::Configuration`] until
/// [`ProviderService::configure`] has succeeded.
pub struct NebraskaProvider<C: Connect = HttpConnector> {
    connector: C,
    session: RwLock<Option<Arc<Session>>>,
}

impl NebraskaProvider<HttpConnector> {
    /// A provider talking HTTP.
    pub fn new() -> Self {
        Self::with_connector(HttpConnector)
    }
}

impl Default for NebraskaProvider<HttpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connect> NebraskaProvider<C> {
    /// A provider obtaining its API handle from `connector`.
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            session: RwLock::new(None),
        }
    }

    /// Whether [`ProviderService::configure`] has succeeded.
    pub async fn is_configured(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn session(&self) -> ProviderResult<Arc<Session>> {
        self.session.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("the provider has not been configured".to_string())
        })
    }

    async fn establish(&self, config: &ProviderConfig) -> Result<Session, Diagnostic> {
        config
            .check_credentials()
            .map_err(|e| e.into_diagnostic_with_summary("Missing credentials"))?;
        let api = self
            .connector
            .connect(&config.endpoint)
            .map_err(|e| e.into_diagnostic_with_summary("Client init"))?;
        configure_session(api, config).await.map_err(|e| {
            let summary = configure_summary(&e);
            e.into_diagnostic_with_summary(summary)
        })
    }
}

fn configure_summary(err: &ProviderError) -> &'static str {
    match err {
        ProviderError::UnexpectedStatus { step, .. } if step == LOGIN_STEP => "Couldn't fetch login token",
        ProviderError::UnexpectedStatus { .. } | ProviderError::Transport(_) => "Config fetch",
        ProviderError::Configuration(msg) if msg.contains("auth_mode") => "Invalid auth_mode",
        ProviderError::Configuration(_) => "Couldn't fetch login token",
        other => other.summary(),
    }
}

/// Fail with a validation error when `value` does not satisfy `schema`.
fn check_schema(type_name: &str, schema: &Schema, value: &Value) -> ProviderResult<()> {
    let problems: Vec<String> = validation::validate(schema, value)
        .into_iter()
        .filter(Diagnostic::is_error)
        .map(|d| match d.detail {
            Some(detail) => format!("{}: {}", d.summary, detail),
            None => d.summary,
        })
        .collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::Validation(format!(
            "{}: {}",
            type_name,
            problems.join("; ")
        )))
    }
}

async fn create_with<R: ResourceHandler>(
    handler: &R,
    session: &Session,
    planned: Value,
) -> ProviderResult<Value> {
    let schema = handler.resource_schema();
    check_schema(handler.type_name(), &schema, &planned)?;
    let state = parse_state(handler.type_name(), &schema, planned)?;
    state_value(&handler.create(session, state).await?)
}

async fn read_with<R: ResourceHandler>(
    handler: &R,
    session: &Session,
    current: Value,
) -> ProviderResult<Value> {
    let state = parse_state(handler.type_name(), &handler.resource_schema(), current)?;
    state_value(&handler.read(session, state).await?)
}

async fn update_with<R: ResourceHandler>(
    handler: &R,
    session: &Session,
    prior: Value,
    planned: Value,
) -> ProviderResult<Value> {
    let schema = handler.resource_schema();
    check_schema(handler.type_name(), &schema, &planned)?;
    let prior = parse_state(handler.type_name(), &schema, prior)?;
    let planned = parse_state(handler.type_name(), &schema, planned)?;
    state_value(&handler.update(session, prior, planned).await?)
}

async fn delete_with<R: ResourceHandler>(
    handler: &R,
    session: &Session,
    current: Value,
) -> ProviderResult<()> {
    let state = parse_state(handler.type_name(), &handler.resource_schema(), current)?;
    handler.delete(session, state).await
}

async fn read_data_source_with<R: ResourceHandler>(
    handler: &R,
    session: &Session,
    config: Value,
) -> ProviderResult<Value> {
    let schema = handler.data_source_schema();
    check_schema(handler.type_name(), &schema, &config)?;
    let state = parse_state(handler.type_name(), &schema, config)?;
    state_value(&handler.read_data_source(session, state).await?)
}

#[async_trait::async_trait]
impl<C: Connect> ProviderService for NebraskaProvider<C> {
    fn schema(&self) -> ProviderSchema {
        let handlers: [(&str, Schema, Schema); 4] = [
            (
                application::TYPE_NAME,
                ApplicationResource.resource_schema(),
                ApplicationResource.data_source_schema(),
            ),
            (
                channel::TYPE_NAME,
                ChannelResource.resource_schema(),
                ChannelResource.data_source_schema(),
            ),
            (
                group::TYPE_NAME,
                GroupResource.resource_schema(),
                GroupResource.data_source_schema(),
            ),
            (
                package::TYPE_NAME,
                PackageResource.resource_schema(),
                PackageResource.data_source_schema(),
            ),
        ];
        handlers.into_iter().fold(
            ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
            |schema, (name, resource, data_source)| {
                schema
                    .with_resource(name, resource)
                    .with_data_source(name, data_source)
            },
        )
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validation::validate(&ProviderConfig::schema(), &config);
        if diagnostics.is_empty() {
            if let Err(e) = ProviderConfig::from_value(&config) {
                diagnostics.push(e.into());
            }
        }
        Ok(diagnostics)
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = match ProviderConfig::from_value(&config) {
            Ok(config) => config,
            Err(e) => return Ok(vec![e.into()]),
        };
        match self.establish(&config).await {
            Ok(session) => {
                *self.session.write().await = Some(Arc::new(session));
                info!(endpoint = %config.endpoint, "provider configured");
                Ok(vec![])
            },
            Err(diagnostic) => {
                warn!(summary = %diagnostic.summary, "provider configuration failed");
                Ok(vec![diagnostic])
            },
        }
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        dispatch!(resource_type, handler => {
            Ok(validation::validate(&handler.resource_schema(), &config))
        })
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let session = self.session().await?;
        dispatch!(resource_type, handler => create_with(&handler, &session, planned_state).await)
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let session = self.session().await?;
        dispatch!(resource_type, handler => read_with(&handler, &session, current_state).await)
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let session = self.session().await?;
        dispatch!(resource_type, handler => {
            update_with(&handler, &session, prior_state, planned_state).await
        })
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let session = self.session().await?;
        dispatch!(resource_type, handler => delete_with(&handler, &session, current_state).await)
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        dispatch!(data_source_type, handler => {
            Ok(validation::validate(&handler.data_source_schema(), &config))
        })
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let session = self.session().await?;
        dispatch!(data_source_type, handler => {
            read_data_source_with(&handler, &session, config).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_error_contains, assert_has_errors, assert_no_errors, FakeNebraska, ProviderTester,
        TestError,
    };
    use crate::types::AuthMode;
    use serde_json::json;

    fn tester(fake: &Arc<FakeNebraska>) -> ProviderTester<NebraskaProvider<Arc<FakeNebraska>>> {
        ProviderTester::new(NebraskaProvider::with_connector(fake.clone()))
    }

    async fn configured(fake: &Arc<FakeNebraska>) -> ProviderTester<NebraskaProvider<Arc<FakeNebraska>>> {
        let tester = tester(fake);
        tester.configure(json!({})).await.unwrap();
        tester
    }

    #[test]
    fn test_schema_lists_every_entity() {
        let provider = NebraskaProvider::new();
        let metadata = provider.metadata();
        let names = vec![
            "nebraska_application",
            "nebraska_channel",
            "nebraska_group",
            "nebraska_package",
        ];
        assert_eq!(metadata.resources, names);
        assert_eq!(metadata.data_sources, names);
        assert!(provider.schema().provider.attribute("auth_mode").is_some());
    }

    #[tokio::test]
    async fn test_operations_require_configure() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let tester = tester(&fake);

        let err = tester
            .create("nebraska_application", json!({"name": "a", "product_id": "io.example.A"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(!tester.provider().is_configured().await);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_configure_reports_mode_mismatch() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Github));
        let provider = NebraskaProvider::with_connector(fake.clone());

        let diagnostics = provider.configure(json!({"auth_mode": "noop"})).await.unwrap();
        assert_error_contains(&diagnostics, "Invalid auth_mode");
        assert!(!provider.is_configured().await);
    }

    #[tokio::test]
    async fn test_configure_reports_missing_credentials() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Oidc));
        let provider = NebraskaProvider::with_connector(fake.clone());

        let diagnostics = provider.configure(json!({"auth_mode": "oidc"})).await.unwrap();
        assert_error_contains(&diagnostics, "Missing credentials");
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_configure_reports_login_failure() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Oidc).with_login_failure(401, "denied"));
        let tester = tester(&fake);

        let err = tester
            .configure(json!({"auth_mode": "oidc", "username": "admin", "password": "pw"}))
            .await
            .unwrap_err();
        match err {
            TestError::Diagnostics(diagnostics) => {
                assert_error_contains(&diagnostics, "Couldn't fetch login token")
            },
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_auth_mode() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let provider = NebraskaProvider::with_connector(fake.clone());

        let diagnostics = provider.configure(json!({"auth_mode": "ldap"})).await.unwrap();
        assert_has_errors(&diagnostics);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_validate_provider_config() {
        let provider = NebraskaProvider::new();
        assert_no_errors(
            &provider
                .validate_provider_config(json!({"endpoint": "https://nebraska.example.com"}))
                .await
                .unwrap(),
        );
        assert_has_errors(
            &provider
                .validate_provider_config(json!({"endpoint": "not a url"}))
                .await
                .unwrap(),
        );
    }

    #[tokio::test]
    async fn test_validate_resource_config_runs_validators() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let tester = tester(&fake);

        tester
            .validate_resource_config(
                "nebraska_application",
                json!({"name": "Flatcar", "product_id": "io.example.Flatcar"}),
            )
            .await
            .unwrap();
        assert!(tester
            .validate_resource_config(
                "nebraska_application",
                json!({"name": "Flatcar", "product_id": "flatcar"}),
            )
            .await
            .is_err());
        assert!(tester
            .validate_resource_config(
                "nebraska_channel",
                json!({"name": "stable", "arch": "sparc", "application_id": "app-1"}),
            )
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_type_is_rejected() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let tester = configured(&fake).await;

        let err = tester.read("nebraska_instance", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
        let err = tester
            .validate_data_source_config("nebraska_instance", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Provider(ProviderError::UnknownResource(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_plan_without_calls() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let tester = configured(&fake).await;
        let before = fake.calls().len();

        let err = tester
            .create("nebraska_package", json!({"application_id": "app-1", "version": "1.0.0"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.to_string().contains("url"));
        assert_eq!(fake.calls().len(), before);
    }

    #[tokio::test]
    async fn test_application_crud() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let tester = configured(&fake).await;

        let state = tester
            .lifecycle_crud(
                "nebraska_application",
                json!({"name": "Flatcar", "product_id": "io.example.Flatcar"}),
                json!({"name": "Flatcar", "product_id": "io.example.Flatcar", "description": "OS"}),
            )
            .await
            .unwrap();
        assert_eq!(state["description"], "OS");
        assert!(fake.apps().is_empty());
    }

    #[tokio::test]
    async fn test_channel_crud() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let tester = configured(&fake).await;

        let state = tester
            .lifecycle_crud(
                "nebraska_channel",
                json!({"name": "stable", "arch": "amd64", "application_id": "app-1"}),
                json!({"name": "stable", "arch": "amd64", "application_id": "app-1", "color": "#777777"}),
            )
            .await
            .unwrap();
        assert_eq!(state["color"], "#777777");
        assert!(fake.channels("app-1").is_empty());
    }

    #[tokio::test]
    async fn test_group_crud() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let tester = configured(&fake).await;

        let state = tester
            .lifecycle_crud(
                "nebraska_group",
                json!({"name": "beta", "application_id": "app-1"}),
                json!({"name": "beta", "application_id": "app-1", "policy_updates_enabled": true}),
            )
            .await
            .unwrap();
        assert_eq!(state["policy_updates_enabled"], true);
        assert_eq!(state["policy_timezone"], "Asia/Calcutta");
        assert!(fake.groups("app-1").is_empty());
    }

    #[tokio::test]
    async fn test_package_crud() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let tester = configured(&fake).await;
        let package = json!({
            "application_id": "app-1",
            "version": "1.2.3",
            "url": "https://github.com/org/manifests",
            "type": "git",
            "filename": "manifests",
            "description": "manifests",
            "size": "0",
            "hash": "none",
            "nua_commit": "abc",
            "nua_namespace": "apps",
            "nua_kustomize_config": "",
        });
        let mut updated = package.clone();
        updated["nua_commit"] = json!("def");

        let state = tester
            .lifecycle_crud("nebraska_package", package, updated)
            .await
            .unwrap();
        assert_eq!(state["type"], "git");
        assert_eq!(state["url"], "https://github.com/org/manifests");
        assert_eq!(state["nua_commit"], "def");
        assert_eq!(state["channels_blacklist"], json!([]));
        assert!(fake.packages("app-1").is_empty());
    }

    #[tokio::test]
    async fn test_data_source_read() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let tester = configured(&fake).await;
        tester
            .create("nebraska_application", json!({"name": "Flatcar", "product_id": "io.example.Flatcar"}))
            .await
            .unwrap();

        let app = tester
            .read_data_source("nebraska_application", json!({"product_id": "io.example.Flatcar"}))
            .await
            .unwrap();
        assert_eq!(app["name"], "Flatcar");

        let err = tester
            .read_data_source("nebraska_channel", json!({"application_id": "app-1", "name": "stable"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }
}
