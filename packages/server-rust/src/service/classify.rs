//! Request classification: raw path and query to a typed `ConsoleOperation`.
//!
//! Rules are tried in a fixed order and the first match wins:
//!
//! 1. `/` redirects to the root type.
//! 2. A query starting with the `call` verb invokes an operation.
//! 3. A query starting with the `get` verb reads a field.
//! 4. `/[<uuid>]` with a `persist` query promotes an ephemeral entry.
//! 5. `/[<uuid>]` or `/$<name>` resolves a token to its members page.
//! 6. A single path segment is a members page.

use std::borrow::Cow;

use objscope_core::request::decode_component;

use super::operation::ConsoleOperation;

const CALL: &str = "call";
const GET: &str = "get";
const PERSIST: &str = "persist";

/// Classifies a request. `path` and `query` are raw, as found in the URI.
#[must_use]
pub fn classify(path: &str, query: Option<&str>) -> ConsoleOperation {
    let path = decode_component(path);
    let query = query.unwrap_or_default();

    if path == "/" || path.is_empty() {
        return ConsoleOperation::RootRedirect;
    }
    if let Some(rest) = strip_verb(query, CALL) {
        return ConsoleOperation::Call {
            path: path.into_owned(),
            query: rest.to_string(),
        };
    }
    if let Some(rest) = strip_verb(query, GET) {
        return ConsoleOperation::GetField {
            path: path.into_owned(),
            receiver: receiver_from(rest),
        };
    }

    let trimmed = path.trim_start_matches('/');
    if trimmed.starts_with('[') {
        if let Some(rest) = strip_verb(query, PERSIST) {
            let name = rest.strip_prefix('=').map(|n| decode_component(n).into_owned());
            return ConsoleOperation::Persist {
                token: trimmed.to_string(),
                name,
            };
        }
        return ConsoleOperation::Resolve {
            token: trimmed.to_string(),
        };
    }
    if trimmed.starts_with('$') {
        return ConsoleOperation::Resolve {
            token: trimmed.to_string(),
        };
    }

    let segment = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if !segment.is_empty() && !segment.contains('/') {
        return ConsoleOperation::Members {
            type_name: segment.to_string(),
            receiver: non_empty(decode_component(query)),
        };
    }

    ConsoleOperation::Unrouted {
        path: path.into_owned(),
    }
}

/// Returns the text after `verb` when the query starts with it as a whole
/// word, so `callback=1` is not taken for `call`.
fn strip_verb<'a>(query: &'a str, verb: &str) -> Option<&'a str> {
    let rest = query.strip_prefix(verb)?;
    match rest.chars().next() {
        None | Some('&' | '=' | '[' | '$') => Some(rest),
        Some(_) => None,
    }
}

/// Extracts a receiver token from the text after `get`, accepting
/// `get[id]`, `get$name`, `get=[id]` and `get&this=[id]`.
fn receiver_from(rest: &str) -> Option<String> {
    let rest = rest.strip_prefix('&').unwrap_or(rest);
    let rest = rest.strip_prefix("this").unwrap_or(rest);
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    non_empty(decode_component(rest))
}

fn non_empty(text: Cow<'_, str>) -> Option<String> {
    (!text.is_empty()).then(|| text.into_owned())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const ID: &str = "6f1c1c52-3a3e-4c4f-9d7e-0a2c9b5d1e11";

    #[test]
    fn root_redirects() {
        assert_eq!(classify("/", None), ConsoleOperation::RootRedirect);
        assert_eq!(classify("/", Some("call")), ConsoleOperation::RootRedirect);
    }

    #[test]
    fn call_verb_wins_over_path_shape() {
        let op = classify("/System/concat", Some("call&string=a&string=b"));
        assert_eq!(
            op,
            ConsoleOperation::Call {
                path: "/System/concat".to_string(),
                query: "&string=a&string=b".to_string(),
            }
        );
        assert!(matches!(
            classify("/System/uptime_millis", Some("call")),
            ConsoleOperation::Call { .. }
        ));
    }

    #[test]
    fn verb_must_be_a_whole_word() {
        assert!(matches!(
            classify("/System", Some("callback=1")),
            ConsoleOperation::Members { .. }
        ));
        assert!(matches!(
            classify("/System", Some("getter")),
            ConsoleOperation::Members { .. }
        ));
    }

    #[test]
    fn get_accepts_receiver_forms() {
        for query in [
            format!("get[{ID}]"),
            format!("get=[{ID}]"),
            format!("get&this=[{ID}]"),
            format!("get=%5B{ID}%5D"),
        ] {
            let op = classify("/Counter/value", Some(&query));
            assert_eq!(
                op,
                ConsoleOperation::GetField {
                    path: "/Counter/value".to_string(),
                    receiver: Some(format!("[{ID}]")),
                },
                "query {query}"
            );
        }
        assert_eq!(
            classify("/System/version", Some("get")),
            ConsoleOperation::GetField {
                path: "/System/version".to_string(),
                receiver: None,
            }
        );
    }

    #[test]
    fn persist_with_and_without_name() {
        let path = format!("/[{ID}]");
        assert_eq!(
            classify(&path, Some("persist")),
            ConsoleOperation::Persist {
                token: format!("[{ID}]"),
                name: None,
            }
        );
        assert_eq!(
            classify(&path, Some("persist=my%20thing")),
            ConsoleOperation::Persist {
                token: format!("[{ID}]"),
                name: Some("my thing".to_string()),
            }
        );
    }

    #[test]
    fn encoded_token_paths_resolve() {
        assert_eq!(
            classify(&format!("/%5B{ID}%5D"), None),
            ConsoleOperation::Resolve {
                token: format!("[{ID}]"),
            }
        );
        assert_eq!(
            classify("/$main", None),
            ConsoleOperation::Resolve {
                token: "$main".to_string(),
            }
        );
    }

    #[test]
    fn persist_only_applies_to_ephemeral_paths() {
        assert_eq!(
            classify("/$main", Some("persist")),
            ConsoleOperation::Resolve {
                token: "$main".to_string(),
            }
        );
    }

    #[test]
    fn single_segment_is_members_page() {
        assert_eq!(
            classify("/Counter", Some("$main")),
            ConsoleOperation::Members {
                type_name: "Counter".to_string(),
                receiver: Some("$main".to_string()),
            }
        );
        assert_eq!(
            classify("/System/", None),
            ConsoleOperation::Members {
                type_name: "System".to_string(),
                receiver: None,
            }
        );
    }

    #[test]
    fn deeper_paths_without_verb_are_unrouted() {
        assert!(matches!(
            classify("/System/concat", None),
            ConsoleOperation::Unrouted { .. }
        ));
    }

    proptest! {
        #[test]
        fn call_verb_always_classifies_as_call(
            path in "/[A-Za-z]{1,8}/[a-z_]{1,8}",
            rest in "(&[a-z]{1,5}(=[a-z0-9]{0,5})?){0,4}",
        ) {
            let query = format!("call{rest}");
            let op = classify(&path, Some(&query));
            prop_assert_eq!(op, ConsoleOperation::Call { path, query: rest });
        }

        #[test]
        fn arbitrary_input_never_panics(
            path in "/\\PC{0,40}",
            query in proptest::option::of("\\PC{0,40}"),
        ) {
            let _ = classify(&path, query.as_deref());
        }
    }
}
