//! The `git` package pseudo-type.
//!
//! Nebraska has no `git` package type. Such packages are stored as `other`
//! with the commit, namespace and kustomize config appended to the package
//! URL as base64 query parameters, and recognised again on read by the
//! presence of those parameter names anywhere in the URL.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::{form_urlencoded, Url};

use crate::error::ProviderError;

/// Query parameter carrying the commit.
pub const NUA_COMMIT: &str = "nua_commit";
/// Query parameter carrying the namespace.
pub const NUA_NAMESPACE: &str = "nua_namespace";
/// Query parameter carrying the kustomize config.
pub const NUA_KUSTOMIZE_CONFIG: &str = "nua_kustomize_config";

const RESERVED: [&str; 3] = [NUA_COMMIT, NUA_NAMESPACE, NUA_KUSTOMIZE_CONFIG];

/// A git source split out of a package URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitSource {
    /// The package URL without the reserved parameters.
    pub url: String,
    /// Git commit to deploy.
    pub commit: String,
    /// Target namespace.
    pub namespace: String,
    /// Kustomize configuration, verbatim.
    pub kustomize_config: String,
}

/// Whether a package URL carries a git source.
///
/// This is a plain substring test, so an `other` package whose URL happens
/// to mention one of the parameter names reads back as `git`.
pub fn is_git_url(url: &str) -> bool {
    RESERVED.iter().any(|name| url.contains(name))
}

/// Append the git source to its URL.
///
/// The URL text is kept as written. It is only parsed to check that it is a
/// URL, so the decoded form compares equal to what was configured.
pub fn encode_url(source: &GitSource) -> Result<String, ProviderError> {
    Url::parse(&source.url)?;
    let (base, fragment) = split_fragment(&source.url);
    let params = form_urlencoded::Serializer::new(String::new())
        .append_pair(NUA_COMMIT, &STANDARD.encode(&source.commit))
        .append_pair(NUA_NAMESPACE, &STANDARD.encode(&source.namespace))
        .append_pair(NUA_KUSTOMIZE_CONFIG, &STANDARD.encode(&source.kustomize_config))
        .finish();
    let separator = if base.contains('?') { '&' } else { '?' };
    Ok(format!("{}{}{}{}", base, separator, params, fragment))
}

/// Split a URL produced by [`encode_url`] back into its parts.
///
/// Parameters that are not reserved are kept byte for byte. A reserved
/// parameter that is missing decodes to an empty string.
pub fn decode_url(encoded: &str) -> Result<GitSource, ProviderError> {
    Url::parse(encoded)?;
    let (base, fragment) = split_fragment(encoded);
    let Some((path, query)) = base.split_once('?') else {
        return Ok(GitSource {
            url: encoded.to_string(),
            ..GitSource::default()
        });
    };

    let mut source = GitSource::default();
    let mut kept = Vec::new();
    for segment in query.split('&') {
        let Some((key, value)) = form_urlencoded::parse(segment.as_bytes()).next() else {
            kept.push(segment);
            continue;
        };
        let slot = match &*key {
            NUA_COMMIT => &mut source.commit,
            NUA_NAMESPACE => &mut source.namespace,
            NUA_KUSTOMIZE_CONFIG => &mut source.kustomize_config,
            _ => {
                kept.push(segment);
                continue;
            },
        };
        *slot = decode_value(&value)?;
    }

    // Empty segments are kept too, so `pkg?` and `pkg?&` survive.
    source.url = if kept.is_empty() {
        format!("{}{}", path, fragment)
    } else {
        format!("{}?{}{}", path, kept.join("&"), fragment)
    };
    Ok(source)
}

/// Split at the first `#`; the fragment keeps its `#`.
fn split_fragment(url: &str) -> (&str, &str) {
    match url.find('#') {
        Some(at) => url.split_at(at),
        None => (url, ""),
    }
}

fn decode_value(value: &str) -> Result<String, ProviderError> {
    let bytes = STANDARD.decode(value)?;
    String::from_utf8(bytes)
        .map_err(|e| ProviderError::Validation(format!("git parameter is not valid UTF-8: {}", e)))
}
