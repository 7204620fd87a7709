//! Cache key derivation
//!
//! Resolution order for `(target, method, args)`:
//! 1. `<method>_key(args)` if the target responds to it and returns non-null
//! 2. the target's generic [`Target::build_key`]
//!
//! With neither, resolution fails with [`Error::MissingKeyCapability`].

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};
use crate::target::Target;

/// Input to a target's generic key builder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyRequest<'a> {
    /// Method being cached
    pub name: &'a str,
    /// Arguments it is called with
    pub args: &'a [Value],
}

/// Letter case applied to a finished key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyCase {
    /// Lowercase the whole key; arguments differing only in case share a key
    Downcase,
    /// Uppercase the whole key; arguments differing only in case share a key
    Upcase,
    /// Leave the key as built
    #[default]
    Preserve,
}

/// Layout of namespaced keys: `[prefix:]namespace:name[:id][:args...][:suffix]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyFormat {
    /// Segment separator
    pub delimiter: String,
    /// Case applied after joining
    pub case: KeyCase,
    /// Leading segment, e.g. an application or schema version
    pub prefix: Option<String>,
    /// Trailing segment
    pub suffix: Option<String>,
}

impl Default for KeyFormat {
    fn default() -> Self {
        Self {
            delimiter: ":".to_string(),
            case: KeyCase::default(),
            prefix: None,
            suffix: None,
        }
    }
}

impl KeyFormat {
    /// Join the key segments. Null arguments are skipped.
    pub fn build(&self, namespace: &str, name: &str, id: Option<&str>, args: &[Value]) -> String {
        let mut segments: Vec<Cow<'_, str>> = Vec::with_capacity(args.len() + 5);
        segments.extend(self.prefix.as_deref().map(Cow::Borrowed));
        segments.push(Cow::Borrowed(namespace));
        segments.push(Cow::Borrowed(name));
        segments.extend(id.map(Cow::Borrowed));
        segments.extend(args.iter().filter_map(|arg| render_arg(arg, &self.delimiter)));
        segments.extend(self.suffix.as_deref().map(Cow::Borrowed));

        let key = segments.join(&self.delimiter);
        match self.case {
            KeyCase::Downcase => key.to_lowercase(),
            KeyCase::Upcase => key.to_uppercase(),
            KeyCase::Preserve => key,
        }
    }
}

/// Render one argument as a key segment.
///
/// Non-string values are compact JSON (object keys sorted), so the same
/// arguments give the same key in every process. Strings are used as-is
/// unless they could be mistaken for another segment: a string that is empty,
/// contains `delimiter`, opens like a JSON string/object/array, or parses as
/// JSON (`"1"`, `"true"`) is written as a quoted JSON string instead.
pub fn render_arg<'v>(value: &'v Value, delimiter: &str) -> Option<Cow<'v, str>> {
    match value {
        Value::Null => None,
        Value::String(s) if is_plain(s, delimiter) => Some(Cow::Borrowed(s)),
        other => Some(Cow::Owned(other.to_string())),
    }
}

fn is_plain(s: &str, delimiter: &str) -> bool {
    !s.is_empty()
        && !s.contains(delimiter)
        && !s.starts_with(['"', '{', '['])
        && serde_json::from_str::<Value>(s).is_err()
}

/// Derive the cache key for `target.method(args)`.
pub fn resolve_key<T: Target + ?Sized>(target: &T, method: &str, args: &[Value]) -> Result<String> {
    let key_method = format!("{method}_key");
    if target.responds_to(&key_method) {
        let value = target.invoke(&key_method, args).map_err(Error::Target)?;
        let key = match value {
            Value::Null => None,
            Value::String(key) => Some(key),
            other => Some(other.to_string()),
        };
        if let Some(key) = key {
            trace!(method, key = %key, "key from per-method key function");
            return non_empty(method, key);
        }
    }

    match target.build_key(&KeyRequest { name: method, args }) {
        Some(built) => {
            let key = built.map_err(Error::Target)?;
            trace!(method, key = %key, "key from generic key builder");
            non_empty(method, key)
        }
        None => Err(Error::MissingKeyCapability {
            method: method.to_string(),
        }),
    }
}

fn non_empty(method: &str, key: String) -> Result<String> {
    if key.is_empty() {
        return Err(Error::InvalidKey {
            method: method.to_string(),
            reason: "key is empty".to_string(),
        });
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NoMethodError;
    use serde_json::json;
    use std::collections::HashSet;

    struct Post {
        id: u64,
    }

    impl Target for Post {
        fn responds_to(&self, method: &str) -> bool {
            matches!(
                method,
                "title" | "title_key" | "body" | "draft_key" | "blank_key" | "broken_key"
            )
        }

        fn invoke(&self, method: &str, args: &[Value]) -> anyhow::Result<Value> {
            match method {
                "title" | "body" => Ok(json!(format!("{method} {}", self.id))),
                "title_key" => Ok(json!(format!("post-title-{}-{}", self.id, args.len()))),
                "draft_key" => Ok(Value::Null),
                "blank_key" => Ok(json!("")),
                "broken_key" => anyhow::bail!("no key for post {}", self.id),
                _ => Err(NoMethodError::new("Post", method).into()),
            }
        }

        fn key_namespace(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("posts"))
        }

        fn key_id(&self) -> Option<String> {
            Some(self.id.to_string())
        }

        fn key_format(&self) -> KeyFormat {
            KeyFormat::default()
        }
    }

    struct Opaque;

    impl Target for Opaque {
        fn responds_to(&self, _method: &str) -> bool {
            false
        }

        fn invoke(&self, method: &str, _args: &[Value]) -> anyhow::Result<Value> {
            Err(NoMethodError::new("Opaque", method).into())
        }
    }

    #[test]
    fn test_format_examples() {
        let format = KeyFormat::default();
        assert_eq!(format.build("users", "foo", Some("7"), &[]), "users:foo:7");
        assert_eq!(format.build("users", "foo", Some("7"), &[json!(1)]), "users:foo:7:1");
        assert_eq!(format.build("user", "foo", None, &[]), "user:foo");
    }

    #[test]
    fn test_default_format_preserves_case() {
        let format = KeyFormat::default();
        assert_eq!(format.case, KeyCase::Preserve);
        assert_eq!(format.build("Users", "foo", Some("7"), &[json!("Ada")]), "Users:foo:7:Ada");
    }

    #[test]
    fn test_format_prefix_suffix_and_case() {
        let format = KeyFormat {
            delimiter: "/".to_string(),
            case: KeyCase::Upcase,
            prefix: Some("v2".to_string()),
            suffix: Some("json".to_string()),
        };
        assert_eq!(
            format.build("users", "foo", Some("7"), &[json!("a")]),
            "V2/USERS/FOO/7/A/JSON"
        );
    }

    #[test]
    fn test_render_args() {
        let format = KeyFormat {
            case: KeyCase::Preserve,
            ..KeyFormat::default()
        };
        let args = [json!("Name"), Value::Null, json!(true), json!({"b": 2, "a": 1})];
        assert_eq!(
            format.build("users", "foo", Some("7"), &args),
            r#"users:foo:7:Name:true:{"a":1,"b":2}"#
        );
    }

    #[test]
    fn test_ambiguous_strings_are_quoted() {
        let format = KeyFormat::default();
        let key = |args: &[Value]| format.build("dirs", "lookup", Some("1"), args);

        assert_eq!(key(&[json!("x:y")]), r#"dirs:lookup:1:"x:y""#);
        assert_eq!(key(&[json!("x"), json!("y")]), "dirs:lookup:1:x:y");
        assert_eq!(key(&[json!("1")]), r#"dirs:lookup:1:"1""#);
        assert_eq!(key(&[json!("")]), "dirs:lookup:1:\"\"");
        assert_eq!(key(&[json!("{a}")]), r#"dirs:lookup:1:"{a}""#);
    }

    #[test]
    fn test_distinct_args_give_distinct_keys() {
        let post = Post { id: 1 };
        let calls: Vec<Vec<Value>> = vec![
            vec![json!("Alice")],
            vec![json!("alice")],
            vec![json!("x:y")],
            vec![json!("x"), json!("y")],
            vec![json!("1")],
            vec![json!(1)],
            vec![json!("true")],
            vec![json!(true)],
            vec![json!("")],
            vec![],
            vec![json!(["a", "b"])],
            vec![json!("a"), json!("b")],
            vec![json!({"k": "v"})],
            vec![json!(r#"{"k":"v"}"#)],
        ];

        let keys: HashSet<String> = calls
            .iter()
            .map(|args| resolve_key(&post, "body", args).unwrap())
            .collect();

        assert_eq!(keys.len(), calls.len());
    }

    #[test]
    fn test_per_method_key_wins() {
        let post = Post { id: 3 };
        let key = resolve_key(&post, "title", &[json!(1)]).unwrap();
        assert_eq!(key, "post-title-3-1");
    }

    #[test]
    fn test_generic_builder_used_without_key_method() {
        let post = Post { id: 3 };
        assert_eq!(resolve_key(&post, "body", &[]).unwrap(), "posts:body:3");
        assert_eq!(resolve_key(&post, "body", &[json!(1)]).unwrap(), "posts:body:3:1");
    }

    #[test]
    fn test_null_per_method_key_falls_through() {
        let post = Post { id: 3 };
        assert_eq!(resolve_key(&post, "draft", &[]).unwrap(), "posts:draft:3");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let post = Post { id: 9 };
        let args = [json!({"z": [1, 2], "a": "x"})];
        let first = resolve_key(&post, "body", &args).unwrap();
        let second = resolve_key(&post, "body", &args).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_per_method_key_is_invalid() {
        let post = Post { id: 3 };
        let err = resolve_key(&post, "blank", &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidKey { ref method, .. } if method == "blank"));
    }

    #[test]
    fn test_failing_per_method_key_is_target_error() {
        let post = Post { id: 3 };
        let err = resolve_key(&post, "broken", &[]).unwrap_err();
        let Error::Target(source) = err else {
            panic!("expected the key function's failure");
        };
        assert_eq!(source.to_string(), "no key for post 3");
    }

    #[test]
    fn test_missing_key_capability() {
        let err = resolve_key(&Opaque, "foo", &[]).unwrap_err();
        assert!(matches!(err, Error::MissingKeyCapability { ref method } if method == "foo"));
    }
}
