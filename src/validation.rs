//! Validation of attribute bags against a [`Schema`].
//!
//! Runs before any request is built so bad input never reaches Nebraska.
//!
//! # Example
//!
//! ```
//! use nebraska_provider::schema::{Attribute, Schema, Validator};
//! use nebraska_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute(
//!         "product_id",
//!         Attribute::required_string().with_validator(Validator::ProductId),
//!     );
//!
//! let diagnostics = validate(&schema, &json!({"name": "Flatcar", "product_id": "io.kinvolk.Flatcar"}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "Flatcar", "product_id": "flatcar"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("product_id".to_string()));
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Schema, Validator};

/// Longest product id Nebraska accepts.
pub const MAX_PRODUCT_ID_LEN: usize = 155;

const PRODUCT_ID_PATTERN: &str =
    r"^[a-zA-Z]+([a-zA-Z0-9\-]*[a-zA-Z0-9])*(\.[a-zA-Z]+([a-zA-Z0-9\-]*[a-zA-Z0-9])*)+$";

static PRODUCT_ID_RE: OnceLock<Regex> = OnceLock::new();

fn product_id_regex() -> Result<&'static Regex, ProviderError> {
    if let Some(re) = PRODUCT_ID_RE.get() {
        return Ok(re);
    }
    let re = Regex::new(PRODUCT_ID_PATTERN)
        .map_err(|e| ProviderError::Validation(format!("product id pattern: {}", e)))?;
    Ok(PRODUCT_ID_RE.get_or_init(|| re))
}

/// Check that `product_id` is a dotted reverse-domain identifier such as
/// `io.example.App` of at most [`MAX_PRODUCT_ID_LEN`] characters.
pub fn validate_product_id(product_id: &str) -> Result<(), ProviderError> {
    if product_id.len() > MAX_PRODUCT_ID_LEN {
        return Err(ProviderError::Validation(format!(
            "product ID {} is not valid (max length {})",
            product_id, MAX_PRODUCT_ID_LEN
        )));
    }
    if !product_id_regex()?.is_match(product_id) {
        return Err(ProviderError::Validation(format!(
            "product ID {} is not valid (has to be in the form e.g. io.example.App)",
            product_id
        )));
    }
    Ok(())
}

/// Check that `value` is an absolute `http`/`https` URL with a host.
pub fn validate_http_url(value: &str) -> Result<(), ProviderError> {
    let url = url::Url::parse(value)?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(()),
        "http" | "https" => Err(ProviderError::Validation(format!(
            "expected {:?} to have a host",
            value
        ))),
        scheme => Err(ProviderError::Validation(format!(
            "expected {:?} to have a url with schema of: \"http,https\", got {:?}",
            value, scheme
        ))),
    }
}

/// Run a [`Validator`] against a string value.
pub fn check_validator(validator: Validator, value: &str) -> Result<(), ProviderError> {
    match validator {
        Validator::NotEmpty if value.is_empty() => Err(ProviderError::Validation(
            "expected a non-empty string".to_string(),
        )),
        Validator::NotEmpty => Ok(()),
        Validator::OneOf(allowed) if allowed.contains(&value) => Ok(()),
        Validator::OneOf(allowed) => Err(ProviderError::Validation(format!(
            "expected one of {:?}, got {:?}",
            allowed, value
        ))),
        Validator::ProductId => validate_product_id(value),
        Validator::HttpUrl => validate_http_url(value),
    }
}

/// Validate a JSON value against a schema.
///
/// Returns one diagnostic per problem; an empty list means the value is valid.
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped
/// - Types must match, then the attribute's [`Validator`] runs on strings
/// - Nested block lists honour `max_items`
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], but returns `Err` with the diagnostics when any were produced.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", value_type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            if !validate_attribute_type(&attr.attr_type, v, path, diagnostics) {
                return;
            }
            if let (Some(validator), Some(s)) = (attr.validator, v.as_str()) {
                if let Err(e) = check_validator(validator, s) {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                            .with_detail(e.message())
                            .with_attribute(path),
                    );
                }
            }
        },
    }
}

/// Returns false when a type error was recorded.
fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let expected = match attr_type {
        AttributeType::String if value.is_string() => return true,
        AttributeType::Int64 if is_int64(value) => return true,
        AttributeType::Bool if value.is_boolean() => return true,
        AttributeType::List(element_type) => match value.as_array() {
            Some(arr) => {
                let before = diagnostics.len();
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
                return diagnostics.len() == before;
            },
            None => "list",
        },
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
    };
    diagnostics.push(type_error(path, expected, value));
    false
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {},
        Some(Value::Array(items)) => {
            let len = items.len() as u32;
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() => true,
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
            .unwrap_or(false),
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn test_valid_product_ids() {
        for id in [
            "io.example.App",
            "io.kinvolk.Flatcar",
            "com.my-company.update-agent",
            "a.b",
            "org.example2.App9",
        ] {
            assert!(validate_product_id(id).is_ok(), "{} should be valid", id);
        }
    }

    #[test]
    fn test_invalid_product_ids() {
        for id in [
            "flatcar",
            "",
            ".io.example",
            "io.example.",
            "io..example",
            "1io.example",
            "io.-example",
            "io.example-",
            "io.exa mple",
            "io.example.9App",
        ] {
            assert!(validate_product_id(id).is_err(), "{:?} should be invalid", id);
        }
    }

    #[test]
    fn test_product_id_length_limit() {
        let segment = "a".repeat(76);
        let at_limit = format!("{}.{}.{}", segment, segment, "a");
        assert_eq!(at_limit.len(), MAX_PRODUCT_ID_LEN);
        assert!(validate_product_id(&at_limit).is_ok());

        let over_limit = format!("{}b", at_limit);
        let err = validate_product_id(&over_limit).unwrap_err();
        assert!(err.to_string().contains("max length 155"));
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("http://localhost:8000").is_ok());
        assert!(validate_http_url("https://nebraska.example.com/").is_ok());
        assert!(validate_http_url("ftp://example.com").is_err());
        assert!(validate_http_url("localhost:8000").is_err());
        assert!(validate_http_url("not a url").is_err());
    }

    #[test]
    fn test_check_validator() {
        assert!(check_validator(Validator::NotEmpty, "x").is_ok());
        assert!(check_validator(Validator::NotEmpty, "").is_err());
        assert!(check_validator(Validator::OneOf(&["noop", "github"]), "github").is_ok());
        assert!(check_validator(Validator::OneOf(&["noop", "github"]), "oidc").is_err());
    }

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "stable"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validator_runs_after_type_check() {
        let schema = Schema::v0().with_attribute(
            "arch",
            Attribute::required_string().with_validator(Validator::OneOf(&["all", "amd64"])),
        );

        assert!(validate(&schema, &json!({"arch": "amd64"})).is_empty());

        let diagnostics = validate(&schema, &json!({"arch": "sparc"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid value"));

        // A type error is reported once, without the validator piling on.
        let diagnostics = validate(&schema, &json!({"arch": 1}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("created_ts", Attribute::computed_string());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"created_ts": 123})).is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("policy_max_updates_per_period", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"policy_max_updates_per_period": 5})).is_empty());
        assert!(validate(&schema, &json!({"policy_max_updates_per_period": 5.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"policy_max_updates_per_period": 5.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"policy_max_updates_per_period": "5"})).len(), 1);
    }

    #[test]
    fn test_validate_string_list() {
        let schema = Schema::v0().with_attribute("channels_blacklist", Attribute::optional_string_list());

        assert!(validate(&schema, &json!({"channels_blacklist": ["a", "b"]})).is_empty());
        assert!(validate(&schema, &json!({"channels_blacklist": []})).is_empty());

        let diagnostics = validate(&schema, &json!({"channels_blacklist": ["a", 1]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("channels_blacklist.1".to_string()));

        assert_eq!(validate(&schema, &json!({"channels_blacklist": "a"})).len(), 1);
    }

    #[test]
    fn test_validate_nested_block_max_items() {
        let schema = Schema::v0().with_block(
            "flatcar_action",
            NestedBlock::list(Block::new().with_attribute("sha256", Attribute::required_string()))
                .with_max_items(1),
        );

        assert!(validate(&schema, &json!({"flatcar_action": [{"sha256": "abc"}]})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"flatcar_action": [{"sha256": "a"}, {"sha256": "b"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 1"));

        let diagnostics = validate(&schema, &json!({"flatcar_action": [{}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("flatcar_action.0.sha256".to_string()));

        let diagnostics = validate(&schema, &json!({"flatcar_action": {"sha256": "a"}}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_multiple_errors() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("policy_safe_mode", Attribute::optional_bool())
            .with_attribute("policy_max_updates_per_period", Attribute::optional_int64());

        let diagnostics = validate(
            &schema,
            &json!({"name": 1, "policy_safe_mode": "yes", "policy_max_updates_per_period": "x"}),
        );
        assert_eq!(diagnostics.len(), 3);
    }

    #[test]
    fn test_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        assert!(is_valid(&schema, &json!({"name": "beta"})));
        assert!(!is_valid(&schema, &json!({})));
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
