//! Variable expansion for reference paths
//!
//! Replaces `${name}` tokens with values from a [`Variables`] context:
//! - `lang/${locale}/data.json` with `locale=en` → `lang/en/data.json`
//! - unknown names expand to the empty string
//! - an unterminated `${` is kept as literal text

use std::collections::HashMap;

const TOKEN_START: &str = "${";
const TOKEN_END: char = '}';

/// A read-only name → value mapping used to expand reference paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: HashMap<String, String>,
}

impl Variables {
    /// Create an empty variable context
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the process environment
    ///
    /// Variables whose name or value is not valid unicode are skipped.
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Add or replace a variable
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a variable in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, String>> for Variables {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Check if a string contains a variable token
pub fn contains_variable(input: &str) -> bool {
    input
        .find(TOKEN_START)
        .is_some_and(|start| input[start + TOKEN_START.len()..].contains(TOKEN_END))
}

/// Expand every `${name}` token in `input`
///
/// Tokens are replaced left to right. Substituted values are never
/// re-scanned, so a value containing `${...}` is inserted verbatim.
pub fn expand(input: &str, variables: &Variables) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(TOKEN_START) {
        let after = &rest[start + TOKEN_START.len()..];
        let Some(end) = after.find(TOKEN_END) else {
            break;
        };

        result.push_str(&rest[..start]);
        result.push_str(variables.get(&after[..end]).unwrap_or_default());
        rest = &after[end + TOKEN_END.len_utf8()..];
    }

    result.push_str(rest);
    result
}
