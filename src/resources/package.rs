//! `nebraska_package`.
//!
//! Packages of type `git` are stored as `other` with the git source folded
//! into the URL (see [`crate::nua`]). State always holds the plain URL and
//! the `git` type.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{arch_matches, require_id, ResourceHandler, CREATED_TS_DESCRIPTION};
use crate::api::{FlatcarAction, FlatcarActionPackage, Package, PackageConfig};
use crate::auth::Session;
use crate::error::{ProviderError, ProviderResult};
use crate::nua::{self, GitSource, NUA_COMMIT, NUA_KUSTOMIZE_CONFIG, NUA_NAMESPACE};
use crate::pagination::find_paginated;
use crate::schema::{Attribute, Block, NestedBlock, Schema, Validator};
use crate::types::{Arch, PackageType};

/// Type name of the resource and data source.
pub const TYPE_NAME: &str = "nebraska_package";

/// The `git` pseudo-type.
pub const GIT_TYPE: &str = "git";

/// Package types accepted in configuration.
pub const TYPE_NAMES: [&str; 5] = ["flatcar", "docker", "rkt", "other", GIT_TYPE];

/// One entry of the `flatcar_action` block.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatcarActionState {
    pub id: Option<String>,
    pub event: Option<String>,
    pub chromeos_version: Option<String>,
    pub sha256: Option<String>,
    pub needs_admin: Option<bool>,
    pub is_delta: Option<bool>,
    pub disable_payload_backoff: Option<bool>,
    pub metadata_signature_rsa: Option<String>,
    pub metadata_size: Option<String>,
    pub deadline: Option<String>,
    pub created_ts: Option<String>,
}

impl From<FlatcarAction> for FlatcarActionState {
    fn from(action: FlatcarAction) -> Self {
        Self {
            id: Some(action.id),
            event: Some(action.event),
            chromeos_version: Some(action.chromeos_version),
            sha256: Some(action.sha256),
            needs_admin: Some(action.needs_admin),
            is_delta: Some(action.is_delta),
            disable_payload_backoff: Some(action.disable_payload_backoff),
            metadata_signature_rsa: Some(action.metadata_signature_rsa),
            metadata_size: Some(action.metadata_size),
            deadline: Some(action.deadline),
            created_ts: Some(action.created_ts.to_string()),
        }
    }
}

/// Attributes of a package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageState {
    /// Server assigned id.
    pub id: Option<String>,
    /// Owning application.
    pub application_id: String,
    /// Package version; with `arch` the data source lookup key.
    pub version: String,
    /// Architecture name, see [`Arch::NAMES`].
    pub arch: String,
    /// Package type name, see [`TYPE_NAMES`].
    #[serde(rename = "type", default)]
    pub package_type: String,
    /// Download URL, without any git parameters.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    #[allow(missing_docs)]
    pub filename: String,
    #[serde(default)]
    #[allow(missing_docs)]
    pub description: String,
    /// Payload size in bytes, as a decimal string.
    #[serde(default)]
    pub size: String,
    /// Payload hash.
    #[serde(default)]
    pub hash: String,
    /// Channels that must never point at this package.
    #[serde(default)]
    pub channels_blacklist: Vec<String>,
    /// At most one Flatcar action.
    #[serde(default)]
    pub flatcar_action: Vec<FlatcarActionState>,
    /// Creation timestamp as rendered by the server.
    pub created_ts: Option<String>,
    /// Git commit, `git` packages only.
    pub nua_commit: Option<String>,
    /// Target namespace, `git` packages only.
    pub nua_namespace: Option<String>,
    /// Kustomize config, `git` packages only.
    pub nua_kustomize_config: Option<String>,
}

impl PackageState {
    fn is_git(&self) -> bool {
        self.package_type == GIT_TYPE
    }

    fn git_source(&self) -> ProviderResult<GitSource> {
        let field = |value: &Option<String>, name: &str| {
            value.clone().ok_or_else(|| {
                ProviderError::Validation(format!(
                    "{} is required for packages of type {:?}",
                    name, GIT_TYPE
                ))
            })
        };
        Ok(GitSource {
            url: self.url.clone(),
            commit: field(&self.nua_commit, NUA_COMMIT)?,
            namespace: field(&self.nua_namespace, NUA_NAMESPACE)?,
            kustomize_config: field(&self.nua_kustomize_config, NUA_KUSTOMIZE_CONFIG)?,
        })
    }

    /// Request body for create and update.
    ///
    /// A `git` package is sent as `other` with the git source encoded in
    /// its URL.
    pub fn to_config(&self) -> ProviderResult<PackageConfig> {
        let (url, package_type) = if self.is_git() {
            (nua::encode_url(&self.git_source()?)?, PackageType::Other)
        } else {
            (self.url.clone(), self.package_type.parse::<PackageType>()?)
        };

        Ok(PackageConfig {
            application_id: self.application_id.clone(),
            arch: self.arch.parse::<Arch>()?.code(),
            channels_blacklist: self.channels_blacklist.clone(),
            description: self.description.clone(),
            filename: self.filename.clone(),
            hash: self.hash.clone(),
            size: self.size.clone(),
            package_type: package_type.code(),
            url,
            version: self.version.clone(),
            flatcar_action: self.flatcar_action.first().map(|action| FlatcarActionPackage {
                sha256: action.sha256.clone(),
            }),
        })
    }

    /// Overwrite the state with what the server returned.
    pub fn apply(&mut self, package: Package) -> ProviderResult<()> {
        if nua::is_git_url(&package.url) {
            let source = nua::decode_url(&package.url)?;
            self.url = source.url;
            self.package_type = GIT_TYPE.to_string();
            self.nua_commit = Some(source.commit);
            self.nua_namespace = Some(source.namespace);
            self.nua_kustomize_config = Some(source.kustomize_config);
        } else {
            self.package_type = PackageType::from_code(package.package_type)?.to_string();
            self.url = package.url;
        }

        self.arch = Arch::from_code(package.arch)?.to_string();
        self.id = Some(package.id);
        self.application_id = package.application_id;
        self.version = package.version;
        self.filename = package.filename;
        self.description = package.description;
        self.size = package.size;
        self.hash = package.hash;
        self.created_ts = Some(package.created_ts.to_string());
        self.channels_blacklist = package.channels_blacklist.unwrap_or_default();
        self.flatcar_action = package
            .flatcar_action
            .map(|action| vec![action.into()])
            .unwrap_or_default();
        Ok(())
    }
}

/// Find a package of `app_id` by version and arch.
pub async fn find_package(
    session: &Session,
    app_id: &str,
    version: &str,
    arch: &str,
) -> ProviderResult<Package> {
    let api = session.api();
    let editors = session.editors();
    let what = format!("Package not found for version: {:?}, arch: {:?}", version, arch);
    find_paginated(
        &what,
        move |page, per_page| api.paginate_packages(app_id, page, per_page, editors),
        |package: &Package| package.version == version && arch_matches(package.arch, arch),
    )
    .await
}

fn flatcar_action_block(sha256: Attribute) -> NestedBlock {
    let mut block = Block::new().with_attribute("sha256", sha256);
    for name in [
        "id",
        "event",
        "chromeos_version",
        "metadata_signature_rsa",
        "metadata_size",
        "deadline",
        "created_ts",
    ] {
        block = block.with_attribute(name, Attribute::computed_string());
    }
    for name in ["needs_admin", "is_delta", "disable_payload_backoff"] {
        block = block.with_attribute(name, Attribute::computed_bool());
    }
    NestedBlock::list(block).with_max_items(1).computed()
}

/// Handler for `nebraska_package`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageResource;

#[async_trait::async_trait]
impl ResourceHandler for PackageResource {
    type State = PackageState;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn resource_schema(&self) -> Schema {
        Schema::v0()
            .with_description("A versioned package of an application.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "version",
                Attribute::required_string().with_validator(Validator::NotEmpty),
            )
            .with_attribute(
                "url",
                Attribute::required_string()
                    .with_description("Download URL of the package.")
                    .with_validator(Validator::HttpUrl),
            )
            .with_attribute(
                "arch",
                Attribute::optional_string()
                    .with_default(json!(Arch::All.as_str()))
                    .with_force_new()
                    .with_validator(Validator::OneOf(&Arch::NAMES)),
            )
            .with_attribute(
                "type",
                Attribute::optional_string()
                    .with_default(json!(PackageType::Flatcar.as_str()))
                    .with_validator(Validator::OneOf(&TYPE_NAMES)),
            )
            .with_attribute("filename", Attribute::required_string())
            .with_attribute("description", Attribute::required_string())
            .with_attribute("size", Attribute::required_string())
            .with_attribute("hash", Attribute::required_string())
            .with_attribute("channels_blacklist", Attribute::optional_string_list())
            .with_block("flatcar_action", flatcar_action_block(Attribute::required_string()))
            .with_attribute(
                "application_id",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute(
                "created_ts",
                Attribute::computed_string().with_description(CREATED_TS_DESCRIPTION),
            )
            .with_attribute(NUA_COMMIT, Attribute::optional_string())
            .with_attribute(NUA_NAMESPACE, Attribute::optional_string())
            .with_attribute(NUA_KUSTOMIZE_CONFIG, Attribute::optional_string())
    }

    fn data_source_schema(&self) -> Schema {
        let mut schema = Schema::v0()
            .with_description("Look up a package by version and arch.")
            .with_attribute("application_id", Attribute::required_string())
            .with_attribute("version", Attribute::required_string())
            .with_attribute("arch", Attribute::required_string())
            .with_attribute("channels_blacklist", Attribute::computed_string_list())
            .with_block("flatcar_action", flatcar_action_block(Attribute::computed_string()));
        for name in [
            "id",
            "type",
            "url",
            "filename",
            "description",
            "size",
            "hash",
            "created_ts",
            NUA_COMMIT,
            NUA_NAMESPACE,
            NUA_KUSTOMIZE_CONFIG,
        ] {
            schema = schema.with_attribute(name, Attribute::computed_string());
        }
        schema
    }

    async fn create(&self, session: &Session, mut planned: PackageState) -> ProviderResult<PackageState> {
        let config = planned.to_config()?;
        let package = session
            .api()
            .create_package(&planned.application_id, &config, session.editors())
            .await?;
        debug!(id = %package.id, "created package");
        planned.apply(package)?;
        Ok(planned)
    }

    async fn read(&self, session: &Session, current: PackageState) -> ProviderResult<PackageState> {
        self.read_data_source(session, current).await
    }

    async fn update(
        &self,
        session: &Session,
        prior: PackageState,
        mut planned: PackageState,
    ) -> ProviderResult<PackageState> {
        let id = require_id(TYPE_NAME, &prior.id)?;
        let config = planned.to_config()?;
        let package = session
            .api()
            .update_package(&planned.application_id, id, &config, session.editors())
            .await?;
        planned.apply(package)?;
        Ok(planned)
    }

    async fn delete(&self, session: &Session, current: PackageState) -> ProviderResult<()> {
        let id = require_id(TYPE_NAME, &current.id)?;
        session
            .api()
            .delete_package(&current.application_id, id, session.editors())
            .await
    }

    async fn read_data_source(
        &self,
        session: &Session,
        mut config: PackageState,
    ) -> ProviderResult<PackageState> {
        let package =
            find_package(session, &config.application_id, &config.version, &config.arch).await?;
        config.apply(package)?;
        Ok(config)
    }
}
