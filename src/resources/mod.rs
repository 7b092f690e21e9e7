//! Resources and data sources exposed by the provider.
//!
//! Each entity module owns a typed state struct, its schemas, the
//! conversions to and from the wire models, and the CRUD calls. State
//! arrives from the host as JSON and is parsed by [`parse_state`] after
//! null attributes are dropped and schema defaults are filled in.

pub mod application;
pub mod channel;
pub mod group;
pub mod package;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::auth::Session;
use crate::error::{ProviderError, ProviderResult};
use crate::schema::Schema;
use crate::types::Arch;

pub use application::ApplicationResource;
pub use channel::ChannelResource;
pub use group::GroupResource;
pub use package::PackageResource;

/// Description shared by every `created_ts` attribute.
pub(crate) const CREATED_TS_DESCRIPTION: &str = "Creation timestamp.";

/// A Nebraska entity managed as a resource and readable as a data source.
#[async_trait::async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Typed attribute set of the entity.
    type State: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Type name, e.g. `nebraska_channel`.
    fn type_name(&self) -> &'static str;

    /// Schema of the managed resource.
    fn resource_schema(&self) -> Schema;

    /// Schema of the data source.
    fn data_source_schema(&self) -> Schema;

    /// Create the entity from planned attributes and return the stored state.
    async fn create(&self, session: &Session, planned: Self::State) -> ProviderResult<Self::State>;

    /// Re-read the entity from the server.
    async fn read(&self, session: &Session, current: Self::State) -> ProviderResult<Self::State>;

    /// Replace the mutable attributes of an existing entity.
    async fn update(
        &self,
        session: &Session,
        prior: Self::State,
        planned: Self::State,
    ) -> ProviderResult<Self::State>;

    /// Delete the entity.
    async fn delete(&self, session: &Session, current: Self::State) -> ProviderResult<()>;

    /// Look the entity up by its business key.
    async fn read_data_source(
        &self,
        session: &Session,
        config: Self::State,
    ) -> ProviderResult<Self::State>;
}

/// Parse a JSON attribute bag into a typed state.
///
/// Null attributes are treated as absent and absent attributes take the
/// schema default. A value of the wrong type is a validation error.
pub fn parse_state<T: DeserializeOwned>(
    type_name: &str,
    schema: &Schema,
    value: Value,
) -> ProviderResult<T> {
    let mut map = match value {
        Value::Object(map) => map,
        Value::Null => Default::default(),
        other => {
            return Err(ProviderError::Validation(format!(
                "{}: expected an object, got {}",
                type_name, other
            )))
        },
    };
    map.retain(|_, v| !v.is_null());
    for (name, attr) in &schema.block.attributes {
        if let Some(default) = &attr.default {
            map.entry(name.clone()).or_insert_with(|| default.clone());
        }
    }
    serde_json::from_value(Value::Object(map))
        .map_err(|e| ProviderError::Validation(format!("{}: {}", type_name, e)))
}

/// Render a typed state as a JSON attribute bag.
pub fn state_value<T: Serialize>(state: &T) -> ProviderResult<Value> {
    Ok(serde_json::to_value(state)?)
}

/// The server id recorded in state, required by update and delete.
pub(crate) fn require_id<'a>(type_name: &str, id: &'a Option<String>) -> ProviderResult<&'a str> {
    id.as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::Validation(format!("{}: state has no id", type_name)))
}

/// Compare a wire arch code with a configured arch name by its string form.
/// Unknown codes never match.
pub(crate) fn arch_matches(code: u32, arch: &str) -> bool {
    Arch::from_code(code)
        .map(|a| a.as_str() == arch)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        #[serde(default)]
        note: Option<String>,
        timezone: String,
    }

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("note", Attribute::optional_string())
            .with_attribute(
                "timezone",
                Attribute::optional_string().with_default(json!("Asia/Calcutta")),
            )
    }

    #[test]
    fn test_parse_state_fills_defaults_and_drops_nulls() {
        let sample: Sample =
            parse_state("sample", &schema(), json!({"name": "a", "note": null, "timezone": null})).unwrap();
        assert_eq!(
            sample,
            Sample {
                name: "a".into(),
                note: None,
                timezone: "Asia/Calcutta".into()
            }
        );

        let sample: Sample =
            parse_state("sample", &schema(), json!({"name": "a", "timezone": "UTC"})).unwrap();
        assert_eq!(sample.timezone, "UTC");
    }

    #[test]
    fn test_parse_state_rejects_wrong_types() {
        let err = parse_state::<Sample>("sample", &schema(), json!({"name": 5})).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.to_string().contains("sample"));

        let err = parse_state::<Sample>("sample", &schema(), json!([])).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id("t", &Some("id-1".into())).unwrap(), "id-1");
        assert!(require_id("t", &Some(String::new())).is_err());
        assert!(require_id("t", &None).is_err());
    }

    #[test]
    fn test_arch_matches_by_name() {
        assert!(arch_matches(1, "amd64"));
        assert!(!arch_matches(1, "all"));
        assert!(!arch_matches(9, "all"));
    }
}
