//! Wire models of the Nebraska API.
//!
//! Field names follow the server's snake_case JSON; page envelopes use the
//! server's camelCase `totalCount`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Timestamp as sent by the server (RFC 3339).
pub type Timestamp = DateTime<FixedOffset>;

/// Response of `GET /config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Auth mode the server runs with, e.g. `noop`.
    pub auth_mode: String,
}

/// Response of `POST /login/token`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginToken {
    /// Session bearer token. Empty when the server sent none.
    #[serde(default)]
    pub token: String,
    /// The `Set-Cookie` header of the login response, verbatim.
    #[serde(skip)]
    pub cookie: String,
}

/// An application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_ts: Timestamp,
}

/// Body of application create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

/// A release channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    pub created_ts: Timestamp,
    pub application_id: String,
    #[serde(default)]
    pub package_id: Option<String>,
    /// Architecture code, see [`crate::types::Arch`].
    pub arch: u32,
}

/// Body of channel create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
    pub arch: u32,
    pub application_id: String,
}

/// A group of instances with an update policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_ts: Timestamp,
    #[serde(default)]
    pub rollout_in_progress: bool,
    pub application_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub policy_updates_enabled: bool,
    #[serde(default)]
    pub policy_safe_mode: bool,
    #[serde(default)]
    pub policy_office_hours: bool,
    #[serde(default)]
    pub policy_timezone: String,
    #[serde(default)]
    pub policy_period_interval: String,
    #[serde(default)]
    pub policy_max_updates_per_period: i64,
    #[serde(default)]
    pub policy_update_timeout: String,
    #[serde(default)]
    pub track: String,
}

/// Body of group create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_updates_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_safe_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_office_hours: Option<bool>,
    pub policy_timezone: String,
    pub policy_period_interval: String,
    pub policy_max_updates_per_period: i64,
    pub policy_update_timeout: String,
}

/// Omaha action attached to a Flatcar package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatcarAction {
    pub id: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub chromeos_version: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub needs_admin: bool,
    #[serde(default)]
    pub is_delta: bool,
    #[serde(default)]
    pub disable_payload_backoff: bool,
    #[serde(default)]
    pub metadata_signature_rsa: String,
    #[serde(default)]
    pub metadata_size: String,
    #[serde(default)]
    pub deadline: String,
    pub created_ts: Timestamp,
}

/// The client-settable part of a [`FlatcarAction`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatcarActionPackage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// A versioned package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    /// Package type code, see [`crate::types::PackageType`].
    #[serde(rename = "type")]
    pub package_type: u32,
    pub version: String,
    pub url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub hash: String,
    pub created_ts: Timestamp,
    #[serde(default)]
    pub channels_blacklist: Option<Vec<String>>,
    pub application_id: String,
    #[serde(default)]
    pub flatcar_action: Option<FlatcarAction>,
    /// Architecture code, see [`crate::types::Arch`].
    pub arch: u32,
}

/// Body of package create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub application_id: String,
    pub arch: u32,
    pub channels_blacklist: Vec<String>,
    pub description: String,
    pub filename: String,
    pub hash: String,
    pub size: String,
    #[serde(rename = "type")]
    pub package_type: u32,
    pub url: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatcar_action: Option<FlatcarActionPackage>,
}

/// A page of a listing endpoint.
pub trait Paginated {
    /// Record type of the listing.
    type Item;

    /// Size of the whole collection, not of this page.
    fn total_count(&self) -> u64;

    /// Records of this page in server order.
    fn into_items(self) -> Vec<Self::Item>;
}

macro_rules! page {
    ($(#[$meta:meta])* $name:ident, $field:ident, $item:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(rename = "totalCount")]
            pub total_count: u64,
            #[serde(default)]
            pub count: u64,
            #[serde(default)]
            pub $field: Option<Vec<$item>>,
        }

        impl Paginated for $name {
            type Item = $item;

            fn total_count(&self) -> u64 {
                self.total_count
            }

            fn into_items(self) -> Vec<$item> {
                self.$field.unwrap_or_default()
            }
        }
    };
}

page!(
    /// Response of `GET /api/apps/{app}/channels`.
    ChannelPage, channels, Channel
);
page!(
    /// Response of `GET /api/apps/{app}/groups`.
    GroupPage, groups, Group
);
page!(
    /// Response of `GET /api/apps/{app}/packages`.
    PackagePage, packages, Package
);
