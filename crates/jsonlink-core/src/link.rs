//! Link resolution
//!
//! Walks a parsed JSON value and replaces every reference string
//! (`@path`, `@!path`, `@path#revision`) with the fully resolved document it
//! names. Siblings in arrays and objects resolve concurrently; results keep
//! their input order.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::expand::{contains_variable, expand, Variables};
use crate::loader::Loader;
use crate::source::{Location, Source};

/// Leading character of a reference string
pub const LINK_SIGIL: char = '@';

/// Marker right after the sigil making a reference required
pub const REQUIRED_MARKER: char = '!';

/// A parsed reference string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Expanded path and optional revision
    pub location: Location,
    /// Whether a missing target is an error rather than `null`
    pub required: bool,
}

impl Reference {
    /// Parse a JSON string value as a reference
    ///
    /// Returns `None` for strings that do not start with `@`. Variables are
    /// expanded before the revision is split off.
    pub fn parse(text: &str, variables: &Variables) -> Option<Self> {
        if !is_reference(text) {
            return None;
        }

        let rest = &text[LINK_SIGIL.len_utf8()..];
        let (required, path) = match rest.strip_prefix(REQUIRED_MARKER) {
            Some(path) => (true, path),
            None => (false, rest),
        };

        let path = if contains_variable(path) {
            expand(path, variables)
        } else {
            path.to_string()
        };

        Some(Self {
            location: Location::parse(&path),
            required,
        })
    }
}

/// Check if a string is a reference
pub fn is_reference(text: &str) -> bool {
    text.starts_with(LINK_SIGIL)
}

/// Resolve every reference inside `value`
///
/// `source` is the document `value` was read from and is the base for
/// relative references. `chain` holds the documents currently being loaded
/// on this branch, for cycle detection.
pub(crate) fn resolve_links<'a>(
    loader: &'a Loader,
    value: Value,
    source: &'a Source,
    variables: &'a Variables,
    chain: &'a [Source],
) -> BoxFuture<'a, Result<Value>> {
    async move {
        match value {
            Value::String(text) => {
                let Some(reference) = Reference::parse(&text, variables) else {
                    return Ok(Value::String(text));
                };

                let target = source
                    .resolve(&reference.location, loader.repository())
                    .await
                    .map_err(|e| e.in_document(source))?;
                log::debug!("{} in {} resolves to {}", text, source, target);

                loader
                    .load_nested(target, variables, reference.required, chain)
                    .await
                    .map_err(|e| e.in_document(source))
            }
            Value::Array(items) => {
                let items = try_join_all(
                    items
                        .into_iter()
                        .map(|item| resolve_links(loader, item, source, variables, chain)),
                )
                .await?;
                Ok(Value::Array(items))
            }
            Value::Object(map) => {
                let (keys, values): (Vec<String>, Vec<Value>) = map.into_iter().unzip();
                let values = try_join_all(
                    values
                        .into_iter()
                        .map(|item| resolve_links(loader, item, source, variables, chain)),
                )
                .await?;
                Ok(Value::Object(keys.into_iter().zip(values).collect::<Map<_, _>>()))
            }
            other => Ok(other),
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::loader::LoaderOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn vars() -> Variables {
        Variables::new().with("locale", "en")
    }

    fn plain_loader() -> Loader {
        Loader::with_options(LoaderOptions::default().with_repository_detection(false))
    }

    #[test]
    fn test_parse_not_a_reference() {
        assert_eq!(Reference::parse("plain text", &vars()), None);
        assert_eq!(Reference::parse("", &vars()), None);
        assert_eq!(Reference::parse("mail me @ home", &vars()), None);
    }

    #[test]
    fn test_parse_optional_reference() {
        let reference = Reference::parse("@b.json", &vars()).unwrap();
        assert_eq!(reference.location, Location::parse("b.json"));
        assert!(!reference.required);
    }

    #[test]
    fn test_parse_required_reference() {
        let reference = Reference::parse("@!conf/b.json#v2", &vars()).unwrap();
        assert_eq!(reference.location.path, "conf/b.json");
        assert_eq!(reference.location.revision.as_deref(), Some("v2"));
        assert!(reference.required);
    }

    #[test]
    fn test_parse_expands_variables() {
        let reference = Reference::parse("@lang/${locale}/data.json", &vars()).unwrap();
        assert_eq!(reference.location.path, "lang/en/data.json");

        let reference = Reference::parse("@lang/${region}/data.json", &vars()).unwrap();
        assert_eq!(reference.location.path, "lang//data.json");
    }

    #[test]
    fn test_parse_variable_may_supply_revision() {
        let vars = Variables::new().with("rev", "v9");
        let reference = Reference::parse("@a.json#${rev}", &vars).unwrap();
        assert_eq!(reference.location.revision.as_deref(), Some("v9"));
    }

    #[test]
    fn test_parse_marker_only_after_sigil() {
        // '!' elsewhere is part of the path
        let reference = Reference::parse("@a!.json", &vars()).unwrap();
        assert_eq!(reference.location.path, "a!.json");
        assert!(!reference.required);
    }

    #[test]
    fn test_parse_literal_dollar_is_kept() {
        let reference = Reference::parse("@cost$/${locale}/a.json", &vars()).unwrap();
        assert_eq!(reference.location.path, "cost$/en/a.json");

        let reference = Reference::parse("@${locale/a.json", &vars()).unwrap();
        assert_eq!(reference.location.path, "${locale/a.json");
    }

    #[test]
    fn test_is_reference() {
        assert!(is_reference("@a.json"));
        assert!(is_reference("@"));
        assert!(!is_reference("a@b"));
    }

    #[tokio::test]
    async fn test_resolve_without_references_is_identity() {
        let loader = plain_loader();
        let source = Source::file("/nonexistent/doc.json");
        let value = json!({
            "name": "app",
            "port": 8080,
            "ratio": 0.5,
            "enabled": true,
            "nothing": null,
            "tags": ["a", "b", {"deep": [1, 2, 3]}],
            "email": "ops@example.com"
        });

        let resolved = resolve_links(&loader, value.clone(), &source, &vars(), &[])
            .await
            .unwrap();
        assert_eq!(resolved, value);
    }

    #[tokio::test]
    async fn test_resolve_preserves_key_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.json"), "1").unwrap();

        let loader = plain_loader();
        let source = Source::file(dir.path().join("doc.json"));
        let value: Value =
            serde_json::from_str(r#"{"zeta": 1, "alpha": "@m.json", "mid": [ "@m.json", 2 ]}"#)
                .unwrap();

        let resolved = resolve_links(&loader, value, &source, &vars(), &[])
            .await
            .unwrap();
        let keys: Vec<&str> = resolved
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();

        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(resolved, json!({"zeta": 1, "alpha": 1, "mid": [1, 2]}));
    }

    #[tokio::test]
    async fn test_resolve_empty_reference_fails() {
        let loader = plain_loader();
        let source = Source::file("/x/a.json");

        let err = resolve_links(&loader, json!({"a": "@!"}), &source, &vars(), &[])
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::UnresolvableReference { .. }));
        assert_eq!(err.source.as_deref(), Some("/x/a.json"));
    }
}
