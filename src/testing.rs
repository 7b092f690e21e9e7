//! Testing utilities for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way a host would, and
//! [`FakeNebraska`] is an in-memory [`NebraskaApi`] that records every call
//! together with the headers it carried.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nebraska_provider::testing::{FakeNebraska, ProviderTester};
//! use nebraska_provider::{AuthMode, NebraskaProvider};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_channel() {
//!     let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
//!     let tester = ProviderTester::new(NebraskaProvider::with_connector(fake.clone()));
//!     tester.configure(json!({})).await.unwrap();
//!
//!     let state = tester.create("nebraska_channel", json!({
//!         "name": "stable", "arch": "amd64", "application_id": "app-1"
//!     })).await.unwrap();
//!
//!     assert_eq!(state["arch"], "amd64");
//! }
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde_json::Value;

use crate::api::{
    AppConfig, Application, Channel, ChannelConfig, ChannelPage, FlatcarAction, Group, GroupConfig,
    GroupPage, LoginToken, NebraskaApi, Package, PackageConfig, PackagePage, RequestEditors,
    ServerConfig, LOGIN_STEP,
};
use crate::error::ProviderError;
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::AuthMode;

/// A test harness for provider implementations.
///
/// This wraps a `ProviderService` implementation and provides
/// simplified methods for testing without a host.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    ///
    /// Returns `Err` with the diagnostics if there are errors.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Create, then read back. Returns the state after read.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let created = self.create(resource_type, config).await?;
        self.read(resource_type, created).await
    }

    /// Update, then read back. Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let updated = self.update(resource_type, prior_state, proposed_state).await?;
        self.read(resource_type, updated).await
    }

    /// Run a full CRUD lifecycle: create → read → update → read → delete.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

/// Check diagnostics and return an error if there are any errors.
fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    let has_errors = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error));

    assert!(has_errors, "Expected at least one error, but got none");
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

// =========================================================================
// Fake Nebraska server
// =========================================================================

/// A call received by [`FakeNebraska`].
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetConfig,
    /// Login, with the username.
    LoginToken(String),
    CreateApp,
    GetApp(String),
    UpdateApp(String),
    DeleteApp(String),
    CreateChannel(String),
    UpdateChannel { app_id: String, id: String },
    DeleteChannel { app_id: String, id: String },
    PaginateChannels { app_id: String, page: u32, per_page: u32 },
    CreateGroup(String),
    UpdateGroup { app_id: String, id: String },
    DeleteGroup { app_id: String, id: String },
    PaginateGroups { app_id: String, page: u32, per_page: u32 },
    CreatePackage(String),
    UpdatePackage { app_id: String, id: String },
    DeletePackage { app_id: String, id: String },
    PaginatePackages { app_id: String, page: u32, per_page: u32 },
}

#[derive(Debug)]
struct Recorded {
    call: Call,
    headers: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct Store {
    calls: Vec<Recorded>,
    apps: Vec<Application>,
    channels: Vec<Channel>,
    groups: Vec<Group>,
    packages: Vec<Package>,
    next_id: i64,
    fail_next: Option<(u16, String)>,
}

impl Store {
    fn next_id(&mut self, prefix: &str) -> (String, Timestamp) {
        self.next_id += 1;
        let created = DateTime::<Utc>::UNIX_EPOCH.fixed_offset() + Duration::seconds(self.next_id);
        (format!("{}-{:04}", prefix, self.next_id), created)
    }
}

type Timestamp = crate::api::models::Timestamp;

/// An in-memory Nebraska server.
///
/// Records are kept in creation order and listed in that order, a page at
/// a time. Unknown ids answer 404. Application existence is not checked
/// for channels, groups and packages.
#[derive(Debug)]
pub struct FakeNebraska {
    auth_mode: AuthMode,
    login: Result<(String, String), (u16, String)>,
    store: Mutex<Store>,
}

fn not_found(step: &str) -> ProviderError {
    ProviderError::unexpected_status(step, 404, "not found")
}

fn page_of<T: Clone>(items: Vec<&T>, page: u32, per_page: u32) -> (u64, Vec<T>) {
    let total = items.len() as u64;
    let skip = page.saturating_sub(1) as usize * per_page as usize;
    let items = items
        .into_iter()
        .skip(skip)
        .take(per_page as usize)
        .cloned()
        .collect();
    (total, items)
}

impl FakeNebraska {
    /// A server running `auth_mode` with no records.
    pub fn new(auth_mode: AuthMode) -> Self {
        Self {
            auth_mode,
            login: Ok(("fake-token".to_string(), String::new())),
            store: Mutex::new(Store::default()),
        }
    }

    /// Answer logins with this token and `Set-Cookie` value.
    pub fn with_login(mut self, token: &str, cookie: &str) -> Self {
        self.login = Ok((token.to_string(), cookie.to_string()));
        self
    }

    /// Reject logins with this status and body.
    pub fn with_login_failure(mut self, status: u16, body: &str) -> Self {
        self.login = Err((status, body.to_string()));
        self
    }

    /// Fail the next call, whatever it is, with this status and body.
    pub fn fail_next(&self, status: u16, body: &str) {
        self.lock().fail_next = Some((status, body.to_string()));
    }

    /// Calls received so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.iter().map(|r| r.call.clone()).collect()
    }

    /// Headers carried by the `index`-th call.
    pub fn headers_of(&self, index: usize) -> Vec<(String, String)> {
        self.lock()
            .calls
            .get(index)
            .map(|r| r.headers.clone())
            .unwrap_or_default()
    }

    /// Stored applications.
    pub fn apps(&self) -> Vec<Application> {
        self.lock().apps.clone()
    }

    /// Stored channels of `app_id`.
    pub fn channels(&self, app_id: &str) -> Vec<Channel> {
        let store = self.lock();
        store
            .channels
            .iter()
            .filter(|c| c.application_id == app_id)
            .cloned()
            .collect()
    }

    /// Stored groups of `app_id`.
    pub fn groups(&self, app_id: &str) -> Vec<Group> {
        let store = self.lock();
        store
            .groups
            .iter()
            .filter(|g| g.application_id == app_id)
            .cloned()
            .collect()
    }

    /// Stored packages of `app_id`.
    pub fn packages(&self, app_id: &str) -> Vec<Package> {
        let store = self.lock();
        store
            .packages
            .iter()
            .filter(|p| p.application_id == app_id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and consume a pending failure.
    fn begin(
        &self,
        step: &str,
        call: Call,
        editors: &RequestEditors,
    ) -> Result<MutexGuard<'_, Store>, ProviderError> {
        let mut store = self.lock();
        let headers = editors
            .headers()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        store.calls.push(Recorded { call, headers });
        match store.fail_next.take() {
            Some((status, body)) => Err(ProviderError::unexpected_status(step, status, body)),
            None => Ok(store),
        }
    }
}

fn package_from(
    id: String,
    created_ts: Timestamp,
    app_id: &str,
    config: &PackageConfig,
    previous: Option<&FlatcarAction>,
    action_id: String,
) -> Package {
    let flatcar_action = config.flatcar_action.as_ref().map(|action| FlatcarAction {
        id: previous.map(|p| p.id.clone()).unwrap_or(action_id),
        event: "postinstall".to_string(),
        chromeos_version: String::new(),
        sha256: action.sha256.clone().unwrap_or_default(),
        needs_admin: false,
        is_delta: false,
        disable_payload_backoff: true,
        metadata_signature_rsa: String::new(),
        metadata_size: String::new(),
        deadline: String::new(),
        created_ts: previous.map(|p| p.created_ts).unwrap_or(created_ts),
    });
    Package {
        id,
        package_type: config.package_type,
        version: config.version.clone(),
        url: config.url.clone(),
        filename: config.filename.clone(),
        description: config.description.clone(),
        size: config.size.clone(),
        hash: config.hash.clone(),
        created_ts,
        channels_blacklist: (!config.channels_blacklist.is_empty())
            .then(|| config.channels_blacklist.clone()),
        application_id: app_id.to_string(),
        flatcar_action,
        arch: config.arch,
    }
}

fn group_from(id: String, created_ts: Timestamp, app_id: &str, config: &GroupConfig) -> Group {
    Group {
        id,
        name: config.name.clone(),
        description: config.description.clone().unwrap_or_default(),
        created_ts,
        rollout_in_progress: false,
        application_id: app_id.to_string(),
        channel_id: config.channel_id.clone(),
        policy_updates_enabled: config.policy_updates_enabled.unwrap_or_default(),
        policy_safe_mode: config.policy_safe_mode.unwrap_or_default(),
        policy_office_hours: config.policy_office_hours.unwrap_or_default(),
        policy_timezone: config.policy_timezone.clone(),
        policy_period_interval: config.policy_period_interval.clone(),
        policy_max_updates_per_period: config.policy_max_updates_per_period,
        policy_update_timeout: config.policy_update_timeout.clone(),
        track: config.track.clone().unwrap_or_default(),
    }
}

#[async_trait::async_trait]
impl NebraskaApi for FakeNebraska {
    async fn get_config(&self, editors: &RequestEditors) -> Result<ServerConfig, ProviderError> {
        let _store = self.begin("Fetching server config", Call::GetConfig, editors)?;
        Ok(ServerConfig {
            auth_mode: self.auth_mode.to_string(),
        })
    }

    async fn login_token(&self, username: &str, _password: &SecretString) -> Result<LoginToken, ProviderError> {
        let _store = self.begin(LOGIN_STEP, Call::LoginToken(username.to_string()), &RequestEditors::none())?;
        match &self.login {
            Ok((token, cookie)) => Ok(LoginToken {
                token: token.clone(),
                cookie: cookie.clone(),
            }),
            Err((status, body)) => Err(ProviderError::unexpected_status(LOGIN_STEP, *status, body.clone())),
        }
    }

    async fn create_app(&self, config: &AppConfig, editors: &RequestEditors) -> Result<Application, ProviderError> {
        let mut store = self.begin("Creating application", Call::CreateApp, editors)?;
        let (id, created_ts) = store.next_id("app");
        let app = Application {
            id,
            product_id: config.product_id.clone(),
            name: config.name.clone(),
            description: config.description.clone().unwrap_or_default(),
            created_ts,
        };
        store.apps.push(app.clone());
        Ok(app)
    }

    async fn get_app(&self, app_id: &str, editors: &RequestEditors) -> Result<Application, ProviderError> {
        let step = "Fetching application";
        let store = self.begin(step, Call::GetApp(app_id.to_string()), editors)?;
        store
            .apps
            .iter()
            .find(|a| a.id == app_id || a.product_id.as_deref() == Some(app_id))
            .cloned()
            .ok_or_else(|| not_found(step))
    }

    async fn update_app(
        &self,
        app_id: &str,
        config: &AppConfig,
        editors: &RequestEditors,
    ) -> Result<Application, ProviderError> {
        let step = "Updating application";
        let mut store = self.begin(step, Call::UpdateApp(app_id.to_string()), editors)?;
        let app = store
            .apps
            .iter_mut()
            .find(|a| a.id == app_id)
            .ok_or_else(|| not_found(step))?;
        app.name = config.name.clone();
        app.description = config.description.clone().unwrap_or_default();
        if config.product_id.is_some() {
            app.product_id = config.product_id.clone();
        }
        Ok(app.clone())
    }

    async fn delete_app(&self, app_id: &str, editors: &RequestEditors) -> Result<(), ProviderError> {
        let step = "Deleting application";
        let mut store = self.begin(step, Call::DeleteApp(app_id.to_string()), editors)?;
        let index = store
            .apps
            .iter()
            .position(|a| a.id == app_id)
            .ok_or_else(|| not_found(step))?;
        store.apps.remove(index);
        Ok(())
    }

    async fn create_channel(
        &self,
        app_id: &str,
        config: &ChannelConfig,
        editors: &RequestEditors,
    ) -> Result<Channel, ProviderError> {
        let mut store = self.begin("Creating channel", Call::CreateChannel(app_id.to_string()), editors)?;
        let (id, created_ts) = store.next_id("channel");
        let channel = Channel {
            id,
            name: config.name.clone(),
            color: config.color.clone(),
            created_ts,
            application_id: app_id.to_string(),
            package_id: config.package_id.clone(),
            arch: config.arch,
        };
        store.channels.push(channel.clone());
        Ok(channel)
    }

    async fn update_channel(
        &self,
        app_id: &str,
        channel_id: &str,
        config: &ChannelConfig,
        editors: &RequestEditors,
    ) -> Result<Channel, ProviderError> {
        let step = "Updating channel";
        let call = Call::UpdateChannel {
            app_id: app_id.to_string(),
            id: channel_id.to_string(),
        };
        let mut store = self.begin(step, call, editors)?;
        let channel = store
            .channels
            .iter_mut()
            .find(|c| c.id == channel_id && c.application_id == app_id)
            .ok_or_else(|| not_found(step))?;
        channel.name = config.name.clone();
        channel.color = config.color.clone();
        channel.package_id = config.package_id.clone();
        channel.arch = config.arch;
        Ok(channel.clone())
    }

    async fn delete_channel(
        &self,
        app_id: &str,
        channel_id: &str,
        editors: &RequestEditors,
    ) -> Result<(), ProviderError> {
        let step = "Deleting channel";
        let call = Call::DeleteChannel {
            app_id: app_id.to_string(),
            id: channel_id.to_string(),
        };
        let mut store = self.begin(step, call, editors)?;
        let index = store
            .channels
            .iter()
            .position(|c| c.id == channel_id && c.application_id == app_id)
            .ok_or_else(|| not_found(step))?;
        store.channels.remove(index);
        Ok(())
    }

    async fn paginate_channels(
        &self,
        app_id: &str,
        page: u32,
        per_page: u32,
        editors: &RequestEditors,
    ) -> Result<ChannelPage, ProviderError> {
        let call = Call::PaginateChannels {
            app_id: app_id.to_string(),
            page,
            per_page,
        };
        let store = self.begin("Fetching channels", call, editors)?;
        let owned = store.channels.iter().filter(|c| c.application_id == app_id).collect();
        let (total_count, channels) = page_of(owned, page, per_page);
        Ok(ChannelPage {
            total_count,
            count: channels.len() as u64,
            channels: Some(channels),
        })
    }

    async fn create_group(
        &self,
        app_id: &str,
        config: &GroupConfig,
        editors: &RequestEditors,
    ) -> Result<Group, ProviderError> {
        let mut store = self.begin("Creating group", Call::CreateGroup(app_id.to_string()), editors)?;
        let (id, created_ts) = store.next_id("group");
        let group = group_from(id, created_ts, app_id, config);
        store.groups.push(group.clone());
        Ok(group)
    }

    async fn update_group(
        &self,
        app_id: &str,
        group_id: &str,
        config: &GroupConfig,
        editors: &RequestEditors,
    ) -> Result<Group, ProviderError> {
        let step = "Updating group";
        let call = Call::UpdateGroup {
            app_id: app_id.to_string(),
            id: group_id.to_string(),
        };
        let mut store = self.begin(step, call, editors)?;
        let group = store
            .groups
            .iter_mut()
            .find(|g| g.id == group_id && g.application_id == app_id)
            .ok_or_else(|| not_found(step))?;
        *group = group_from(group.id.clone(), group.created_ts, app_id, config);
        Ok(group.clone())
    }

    async fn delete_group(
        &self,
        app_id: &str,
        group_id: &str,
        editors: &RequestEditors,
    ) -> Result<(), ProviderError> {
        let step = "Deleting group";
        let call = Call::DeleteGroup {
            app_id: app_id.to_string(),
            id: group_id.to_string(),
        };
        let mut store = self.begin(step, call, editors)?;
        let index = store
            .groups
            .iter()
            .position(|g| g.id == group_id && g.application_id == app_id)
            .ok_or_else(|| not_found(step))?;
        store.groups.remove(index);
        Ok(())
    }

    async fn paginate_groups(
        &self,
        app_id: &str,
        page: u32,
        per_page: u32,
        editors: &RequestEditors,
    ) -> Result<GroupPage, ProviderError> {
        let call = Call::PaginateGroups {
            app_id: app_id.to_string(),
            page,
            per_page,
        };
        let store = self.begin("Fetching groups", call, editors)?;
        let owned = store.groups.iter().filter(|g| g.application_id == app_id).collect();
        let (total_count, groups) = page_of(owned, page, per_page);
        Ok(GroupPage {
            total_count,
            count: groups.len() as u64,
            groups: Some(groups),
        })
    }

    async fn create_package(
        &self,
        app_id: &str,
        config: &PackageConfig,
        editors: &RequestEditors,
    ) -> Result<Package, ProviderError> {
        let mut store = self.begin("Creating package", Call::CreatePackage(app_id.to_string()), editors)?;
        let (id, created_ts) = store.next_id("package");
        let (action_id, _) = store.next_id("action");
        let package = package_from(id, created_ts, app_id, config, None, action_id);
        store.packages.push(package.clone());
        Ok(package)
    }

    async fn update_package(
        &self,
        app_id: &str,
        package_id: &str,
        config: &PackageConfig,
        editors: &RequestEditors,
    ) -> Result<Package, ProviderError> {
        let step = "Updating package";
        let call = Call::UpdatePackage {
            app_id: app_id.to_string(),
            id: package_id.to_string(),
        };
        let mut store = self.begin(step, call, editors)?;
        let (action_id, _) = store.next_id("action");
        let package = store
            .packages
            .iter_mut()
            .find(|p| p.id == package_id && p.application_id == app_id)
            .ok_or_else(|| not_found(step))?;
        *package = package_from(
            package.id.clone(),
            package.created_ts,
            app_id,
            config,
            package.flatcar_action.as_ref(),
            action_id,
        );
        Ok(package.clone())
    }

    async fn delete_package(
        &self,
        app_id: &str,
        package_id: &str,
        editors: &RequestEditors,
    ) -> Result<(), ProviderError> {
        let step = "Deleting package";
        let call = Call::DeletePackage {
            app_id: app_id.to_string(),
            id: package_id.to_string(),
        };
        let mut store = self.begin(step, call, editors)?;
        let index = store
            .packages
            .iter()
            .position(|p| p.id == package_id && p.application_id == app_id)
            .ok_or_else(|| not_found(step))?;
        store.packages.remove(index);
        Ok(())
    }

    async fn paginate_packages(
        &self,
        app_id: &str,
        page: u32,
        per_page: u32,
        editors: &RequestEditors,
    ) -> Result<PackagePage, ProviderError> {
        let call = Call::PaginatePackages {
            app_id: app_id.to_string(),
            page,
            per_page,
        };
        let store = self.begin("Fetching packages", call, editors)?;
        let owned = store.packages.iter().filter(|p| p.application_id == app_id).collect();
        let (total_count, packages) = page_of(owned, page, per_page);
        Ok(PackagePage {
            total_count,
            count: packages.len() as u64,
            packages: Some(packages),
        })
    }
}

/// A noop session on `fake`.
#[cfg(test)]
pub(crate) async fn session(fake: std::sync::Arc<FakeNebraska>) -> crate::auth::Session {
    let config = crate::config::ProviderConfig::resolve(&serde_json::json!({}), |_| None)
        .expect("default config resolves");
    crate::auth::configure_session(fake, &config)
        .await
        .expect("noop session")
}
