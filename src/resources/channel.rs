//! `nebraska_channel`.
//!
//! Channels have no lookup endpoint; reads walk the application's channel
//! listing for the first entry matching both name and arch.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{arch_matches, require_id, ResourceHandler, CREATED_TS_DESCRIPTION};
use crate::api::{Channel, ChannelConfig};
use crate::auth::Session;
use crate::error::ProviderResult;
use crate::pagination::find_paginated;
use crate::schema::{Attribute, Schema, Validator};
use crate::types::Arch;

/// Type name of the resource and data source.
pub const TYPE_NAME: &str = "nebraska_channel";

/// Attributes of a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    /// Server assigned id.
    pub id: Option<String>,
    /// Channel name, unique per arch.
    pub name: String,
    /// Architecture name, see [`Arch::NAMES`].
    pub arch: String,
    /// Owning application.
    pub application_id: String,
    /// Display color.
    pub color: Option<String>,
    /// Creation timestamp as rendered by the server.
    pub created_ts: Option<String>,
    /// Package the channel points at.
    pub package_id: Option<String>,
}

impl ChannelState {
    /// Request body for create and update.
    pub fn to_config(&self) -> ProviderResult<ChannelConfig> {
        Ok(ChannelConfig {
            name: self.name.clone(),
            color: self.color.clone().unwrap_or_default(),
            package_id: self.package_id.clone(),
            arch: self.arch.parse::<Arch>()?.code(),
            application_id: self.application_id.clone(),
        })
    }

    /// Overwrite the state with what the server returned.
    pub fn apply(&mut self, channel: Channel) -> ProviderResult<()> {
        self.arch = Arch::from_code(channel.arch)?.to_string();
        self.id = Some(channel.id);
        self.name = channel.name;
        self.application_id = channel.application_id;
        self.color = Some(channel.color);
        self.created_ts = Some(channel.created_ts.to_string());
        self.package_id = channel.package_id;
        Ok(())
    }
}

/// Find a channel of `app_id` by name and arch.
pub async fn find_channel(
    session: &Session,
    app_id: &str,
    name: &str,
    arch: &str,
) -> ProviderResult<Channel> {
    let api = session.api();
    let editors = session.editors();
    let what = format!("Channel not found for name: {:?}, arch: {:?}", name, arch);
    find_paginated(
        &what,
        move |page, per_page| api.paginate_channels(app_id, page, per_page, editors),
        |channel: &Channel| channel.name == name && arch_matches(channel.arch, arch),
    )
    .await
}

/// Handler for `nebraska_channel`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelResource;

#[async_trait::async_trait]
impl ResourceHandler for ChannelResource {
    type State = ChannelState;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn resource_schema(&self) -> Schema {
        Schema::v0()
            .with_description("A release channel of an application.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name of the channel.")
                    .with_validator(Validator::NotEmpty),
            )
            .with_attribute(
                "arch",
                Attribute::required_string()
                    .with_description("Architecture of the channel.")
                    .with_force_new()
                    .with_validator(Validator::OneOf(&Arch::NAMES)),
            )
            .with_attribute(
                "application_id",
                Attribute::required_string()
                    .with_description("Id of the owning application.")
                    .with_force_new(),
            )
            .with_attribute(
                "color",
                Attribute::optional_string()
                    .computed()
                    .with_description("Color shown in the dashboard."),
            )
            .with_attribute(
                "created_ts",
                Attribute::computed_string().with_description(CREATED_TS_DESCRIPTION),
            )
            .with_attribute(
                "package_id",
                Attribute::optional_string().with_description("Package the channel points at."),
            )
    }

    fn data_source_schema(&self) -> Schema {
        Schema::v0()
            .with_description("Look up a channel by name and arch.")
            .with_attribute("application_id", Attribute::required_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("arch", Attribute::required_string())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("color", Attribute::computed_string())
            .with_attribute(
                "created_ts",
                Attribute::computed_string().with_description(CREATED_TS_DESCRIPTION),
            )
            .with_attribute("package_id", Attribute::computed_string())
    }

    async fn create(&self, session: &Session, mut planned: ChannelState) -> ProviderResult<ChannelState> {
        let config = planned.to_config()?;
        let channel = session
            .api()
            .create_channel(&planned.application_id, &config, session.editors())
            .await?;
        debug!(id = %channel.id, "created channel");
        planned.apply(channel)?;
        Ok(planned)
    }

    async fn read(&self, session: &Session, current: ChannelState) -> ProviderResult<ChannelState> {
        self.read_data_source(session, current).await
    }

    async fn update(
        &self,
        session: &Session,
        prior: ChannelState,
        mut planned: ChannelState,
    ) -> ProviderResult<ChannelState> {
        let id = require_id(TYPE_NAME, &prior.id)?;
        let config = planned.to_config()?;
        let channel = session
            .api()
            .update_channel(&planned.application_id, id, &config, session.editors())
            .await?;
        planned.apply(channel)?;
        Ok(planned)
    }

    async fn delete(&self, session: &Session, current: ChannelState) -> ProviderResult<()> {
        let id = require_id(TYPE_NAME, &current.id)?;
        session
            .api()
            .delete_channel(&current.application_id, id, session.editors())
            .await
    }

    async fn read_data_source(
        &self,
        session: &Session,
        mut config: ChannelState,
    ) -> ProviderResult<ChannelState> {
        let channel = find_channel(session, &config.application_id, &config.name, &config.arch).await?;
        config.apply(channel)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::testing::{session, Call, FakeNebraska};
    use crate::types::AuthMode;
    use std::sync::Arc;

    fn planned(name: &str, arch: &str) -> ChannelState {
        ChannelState {
            name: name.into(),
            arch: arch.into(),
            application_id: "app-1".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_sends_arch_code_and_empty_color() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let session = session(fake.clone()).await;

        let state = ChannelResource
            .create(&session, planned("stable", "amd64"))
            .await
            .unwrap();
        assert_eq!(state.arch, "amd64");
        assert_eq!(state.color.as_deref(), Some(""));
        assert!(state.id.is_some());

        let stored = fake.channels("app-1");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].arch, 1);
    }

    #[tokio::test]
    async fn test_lookup_matches_name_and_arch() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let session = session(fake.clone()).await;
        for i in 0..14 {
            ChannelResource
                .create(&session, planned(&format!("filler-{}", i), "all"))
                .await
                .unwrap();
        }
        ChannelResource.create(&session, planned("stable", "all")).await.unwrap();
        let wanted = ChannelResource
            .create(&session, planned("stable", "aarch64"))
            .await
            .unwrap();

        let found = ChannelResource
            .read_data_source(&session, planned("stable", "aarch64"))
            .await
            .unwrap();
        assert_eq!(found.id, wanted.id);

        let pages: Vec<_> = fake
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::PaginateChannels { .. }))
            .collect();
        assert_eq!(pages.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_channel_names_the_key() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let session = session(fake.clone()).await;

        let err = ChannelResource
            .read_data_source(&session, planned("edge", "x86"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(err
            .to_string()
            .contains(r#"Channel not found for name: "edge", arch: "x86""#));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let session = session(fake.clone()).await;
        let created = ChannelResource
            .create(&session, planned("stable", "amd64"))
            .await
            .unwrap();

        let mut changed = created.clone();
        changed.color = Some("#ff0000".into());
        changed.package_id = Some("pkg-1".into());
        let updated = ChannelResource
            .update(&session, created.clone(), changed)
            .await
            .unwrap();
        assert_eq!(updated.color.as_deref(), Some("#ff0000"));
        assert_eq!(updated.package_id.as_deref(), Some("pkg-1"));

        ChannelResource.delete(&session, updated).await.unwrap();
        assert!(fake.channels("app-1").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_arch_is_rejected_before_any_call() {
        let fake = Arc::new(FakeNebraska::new(AuthMode::Noop));
        let session = session(fake.clone()).await;
        let calls = fake.calls().len();

        let err = ChannelResource
            .create(&session, planned("stable", "sparc"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert_eq!(fake.calls().len(), calls);
    }
}
