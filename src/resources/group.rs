//! `nebraska_group`.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{require_id, ResourceHandler, CREATED_TS_DESCRIPTION};
use crate::api::{Group, GroupConfig};
use crate::auth::Session;
use crate::error::ProviderResult;
use crate::pagination::find_paginated;
use crate::schema::{Attribute, Schema, Validator};

/// Type name of the resource and data source.
pub const TYPE_NAME: &str = "nebraska_group";

/// Attributes of a group and its update policy.
///
/// Policy attributes always carry a value: the resource schema supplies
/// defaults and the data source fills them from the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    /// Server assigned id.
    pub id: Option<String>,
    /// Group name; the data source lookup key.
    pub name: String,
    /// Owning application.
    pub application_id: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Update track.
    pub track: Option<String>,
    /// Channel the group follows.
    pub channel_id: Option<String>,
    /// Creation timestamp as rendered by the server.
    pub created_ts: Option<String>,
    /// Whether a rollout is currently running.
    pub rollout_in_progress: Option<bool>,
    /// Whether instances may update at all.
    #[serde(default)]
    pub policy_updates_enabled: bool,
    /// Stop the rollout after the first failed update.
    #[serde(default)]
    pub policy_safe_mode: bool,
    /// Only update during office hours.
    #[serde(default)]
    pub policy_office_hours: bool,
    /// Timezone used by the office hours policy.
    #[serde(default)]
    pub policy_timezone: String,
    /// Length of a rollout period, e.g. `1 hours`.
    #[serde(default)]
    pub policy_period_interval: String,
    /// Updates allowed per period.
    #[serde(default)]
    pub policy_max_updates_per_period: i64,
    /// Time after which an update is considered failed, e.g. `1 days`.
    #[serde(default)]
    pub policy_update_timeout: String,
}

impl GroupState {
    /// Request body for create and update.
    pub fn to_config(&self) -> GroupConfig {
        GroupConfig {
            name: self.name.clone(),
            description: self.description.clone(),
            channel_id: self.channel_id.clone(),
            track: self.track.clone(),
            policy_updates_enabled: Some(self.policy_updates_enabled),
            policy_safe_mode: Some(self.policy_safe_mode),
            policy_office_hours: Some(self.policy_office_hours),
            policy_timezone: self.policy_timezone.clone(),
            policy_period_interval: self.policy_period_interval.clone(),
            policy_max_updates_per_period: self.policy_max_updates_per_period,
            policy_update_timeout: self.policy_update_timeout.clone(),
        }
    }

    /// Overwrite the state with what the server returned.
    pub fn apply(&mut self, group: Group) {
        self.id = Some(group.id);
        self.name = group.name;
        self.application_id = group.application_id;
        self.description = Some(group.description);
        self.track = Some(group.track);
        self.channel_id = group.channel_id;
        self.created_ts = Some(group.created_ts.to_string());
        self.rollout_in_progress = Some(group.rollout_in_progress);
        self.policy_updates_enabled = group.policy_updates_enabled;
        self.policy_safe_mode = group.policy_safe_mode;
        self.policy_office_hours = group.policy_office_hours;
        self.policy_timezone = group.policy_timezone;
        self.policy_period_interval = group.policy_period_interval;
        self.policy_max_updates_per_period = group.policy_max_updates_per_period;
        self.policy_update_timeout = group.policy_update_timeout;
    }
}

/// Find a group of `app_id` by name.
pub async fn find_group(session: &Session, app_id: &str, name: &str) -> ProviderResult<Group> {
    let api = session.api();
    let editors = session.editors();
    let what = format!("Group not found for name: {:?}, appId: {:?}", name, app_id);
    find_paginated(
        &what,
        move |page, per_page| api.paginate_groups(app_id, page, per_page, editors),
        |group: &Group| group.name == name,
    )
    .await
}

/// Handler for `nebraska_group`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupResource;

#[async_trait::async_trait]
impl ResourceHandler for GroupResource {
    type State = GroupState;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn resource_schema(&self) -> Schema {
        Schema::v0()
            .with_description("A group of instances sharing a channel and update policy.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name of the group.")
                    .with_validator(Validator::NotEmpty),
            )
            .with_attribute(
                "application_id",
                Attribute::required_string()
                    .with_description("Id of the owning application.")
                    .with_force_new(),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("track", Attribute::optional_string().computed())
            .with_attribute(
                "channel_id",
                Attribute::optional_string().with_description("Channel the group follows."),
            )
            .with_attribute(
                "created_ts",
                Attribute::computed_string().with_description(CREATED_TS_DESCRIPTION),
            )
            .with_attribute("rollout_in_progress", Attribute::computed_bool())
            .with_attribute(
                "policy_updates_enabled",
                Attribute::optional_bool().with_default(json!(false)),
            )
            .with_attribute(
                "policy_safe_mode",
                Attribute::optional_bool().with_default(json!(false)),
            )
            .with_attribute(
                "policy_office_hours",
                Attribute::optional_bool().with_default(json!(false)),
            )
            .with_attribute(
                "policy_timezone",
                Attribute::optional_string().with_default(json!("Asia/Calcutta")),
            )
            .with_attribute(
                "policy_period_interval",
                Attribute::optional_string().with_default(json!("1 hours")),
            )
            .with_attribute(
                "policy_max_updates_per_period",
                Attribute::optional_int64().with_default(json!(1)),
            )
            .with_attribute(
                "policy_update_timeout",
                Attribute::optional_string().with_default(json!("1 days")),
            )
    }

    fn data_source_schema(&self) -> Schema {
        let computed = [
            "id",
            "description",
            "track",
            "channel_id",
            "created_ts",
            "policy_timezone",
            "policy_period_interval",
            "policy_update_timeout",
        ];
        let computed_bools = [
            "rollout_in_progress",
            "policy_updates_enabled",
            "policy_safe_mode",
            "policy_office_hours",
        ];

        let mut schema = Schema::v0()
            .with_description("Look up a group by name.")
            .with_attribute("application_id", Attribute::required_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "policy_max_updates_per_period",
                Attribute::optional_int64().computed(),
            );
        for name in computed {
            schema = schema.with_attribute(name, Attribute::computed_string());
        }
        for name in computed_bools {
            schema = schema.with_attribute(name, Attribute::computed_bool());
        }
        schema
    }

    async fn create(&self, session: &Session, mut planned: GroupState) -> ProviderResult<GroupState> {
        let group = session
            .api()
            .create_group(&planned.application_id, &planned.to_config(), session.editors())
            .await?;
        debug!(id = %group.id, "created group");
        planned.apply(group);
        Ok(planned)
    }

    async fn read(&self, session: &Session, current: GroupState) -> ProviderResult<GroupState> {
        self.read_data_source(session, current).await
    }

    async fn update(
        &self,
        session: &Session,
        prior: GroupState,
        mut planned: GroupState,
    ) -> ProviderResult<GroupState> {
        let id = require_id(TYPE_NAME, &prior.id)?;
        let group = session
            .api()
            .update_group(&planned.application_id, id, &planned.to_config(), session.editors())
            .await?;
        planned.apply(group);
        Ok(planned)
    }

    async fn delete(&self, session: &Session, current: GroupState) -> ProviderResult<()> {
        let id = require_id(TYPE_NAME, &current.id)?;
        session
            .api()
            .delete_group(&current.application_id, id, session.editors())
            .await
    }

    async fn read_data_source(&self, session: &Session, mut config: GroupState) -> ProviderResult<GroupState> {
        let group = find_group(session, &config.application_id, &config.name).await?;
        config.apply(group);
        Ok(config)
    }
}
