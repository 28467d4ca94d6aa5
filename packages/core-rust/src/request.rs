//! Invocation request grammar.
//!
//! ```text
//! path  = ["/"] targetType "/" operationName
//! query = token ("&" token)*
//! token = key ["=" value]
//! ```
//!
//! The key `this` sets the receiver token. Every other key is a parameter
//! type name, kept in order and never de-duplicated, so the list of keys
//! selects among overloads.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Reserved query key carrying the receiver token.
pub const RECEIVER_KEY: &str = "this";

/// Characters that would change how a component splits, plus the usual
/// unsafe URL characters.
const COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'/')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?');

/// The path or query does not follow the request grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed request {input:?}: {reason}")]
pub struct RequestFormatError {
    pub input: String,
    pub reason: &'static str,
}

/// One declared parameter and its raw argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub type_name: String,
    /// `None` when the key had no `=value` part.
    pub raw: Option<String>,
}

/// A parsed call, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    target_type: String,
    operation: String,
    receiver: Option<String>,
    parameters: Vec<Parameter>,
}

impl InvocationRequest {
    /// Parses a path (`Type/op`) and a query string (without the leading `?`).
    ///
    /// The path is taken as already decoded. Query keys and values are
    /// percent-decoded after splitting, so encoded `&` and `=` inside argument
    /// text survive.
    ///
    /// # Errors
    ///
    /// Fails when the path has no `/` separating type and operation, or when
    /// either part is empty.
    pub fn from_strings(path: &str, query: &str) -> Result<Self, RequestFormatError> {
        let trimmed = path.trim_start_matches('/');
        let (target_type, operation) = trimmed.split_once('/').ok_or_else(|| RequestFormatError {
            input: path.to_string(),
            reason: "type name is missing for operation",
        })?;
        if target_type.is_empty() || operation.is_empty() {
            return Err(RequestFormatError {
                input: path.to_string(),
                reason: "empty type or operation name",
            });
        }

        let mut receiver = None;
        let mut parameters = Vec::new();
        for token in query.split('&').filter(|t| !t.is_empty()) {
            let (key, value) = match token.split_once('=') {
                Some((key, value)) => (key, Some(decode_component(value).into_owned())),
                None => (token, None),
            };
            let key = decode_component(key);
            if key == RECEIVER_KEY {
                receiver = value;
            } else {
                parameters.push(Parameter {
                    type_name: key.into_owned(),
                    raw: value,
                });
            }
        }

        Ok(Self {
            target_type: target_type.to_string(),
            operation: operation.to_string(),
            receiver,
            parameters,
        })
    }

    /// Parses a combined `Type/op?query` string.
    ///
    /// # Errors
    ///
    /// Same as [`from_strings`](Self::from_strings).
    pub fn parse(line: &str) -> Result<Self, RequestFormatError> {
        let (path, query) = line.split_once('?').unwrap_or((line, ""));
        Self::from_strings(path, query)
    }

    #[must_use]
    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Receiver token, if `this=<token>` was given.
    #[must_use]
    pub fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Declared parameter type names, in request order.
    #[must_use]
    pub fn parameter_types(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.type_name.as_str()).collect()
    }
}

/// Percent-decodes one path or query component. `+` is left as is.
#[must_use]
pub fn decode_component(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}

/// Percent-encodes text for use as one path or query component.
///
/// `[`, `]` and `$` pass through so reference tokens stay readable in links.
#[must_use]
pub fn encode_component(text: &str) -> Cow<'_, str> {
    utf8_percent_encode(text, COMPONENT).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_receiver_and_parameter() {
        let req = InvocationRequest::from_strings("Foo/bar", "this=$x&int=5").unwrap();
        assert_eq!(req.target_type(), "Foo");
        assert_eq!(req.operation(), "bar");
        assert_eq!(req.receiver(), Some("$x"));
        assert_eq!(
            req.parameters(),
            &[Parameter {
                type_name: "int".to_string(),
                raw: Some("5".to_string()),
            }]
        );
    }

    #[test]
    fn leading_slashes_are_ignored() {
        let req = InvocationRequest::from_strings("//Foo/bar", "").unwrap();
        assert_eq!(req.target_type(), "Foo");
        assert!(req.parameters().is_empty());
    }

    #[test]
    fn missing_separator_is_format_error() {
        let err = InvocationRequest::from_strings("Foo", "int=1").unwrap_err();
        assert_eq!(err.input, "Foo");
        assert!(InvocationRequest::from_strings("/Foo/", "").is_err());
    }

    #[test]
    fn receiver_key_without_value_leaves_receiver_unset() {
        let req = InvocationRequest::from_strings("Foo/bar", "this&int=1").unwrap();
        assert_eq!(req.receiver(), None);
        assert_eq!(req.parameter_types(), vec!["int"]);
    }

    #[test]
    fn repeated_keys_keep_their_positions() {
        let req = InvocationRequest::from_strings("Foo/bar", "int=1&string=a&int=2&int").unwrap();
        assert_eq!(req.parameter_types(), vec!["int", "string", "int", "int"]);
        let raws: Vec<_> = req.parameters().iter().map(|p| p.raw.as_deref()).collect();
        assert_eq!(raws, vec![Some("1"), Some("a"), Some("2"), None]);
    }

    #[test]
    fn value_is_split_at_first_equals_only() {
        let req = InvocationRequest::from_strings("Foo/bar", "string=a=b").unwrap();
        assert_eq!(req.parameters()[0].raw.as_deref(), Some("a=b"));
    }

    #[test]
    fn components_are_percent_decoded_after_splitting() {
        let req =
            InvocationRequest::from_strings("Foo/bar", "this=%5Babc%5D&string=a%26b%3Dc+d").unwrap();
        assert_eq!(req.receiver(), Some("[abc]"));
        assert_eq!(req.parameters()[0].raw.as_deref(), Some("a&b=c+d"));
    }

    #[test]
    fn encoded_components_decode_back() {
        let text = "a&b=c d/é";
        let encoded = encode_component(text);
        assert!(!encoded.contains('&'));
        assert!(!encoded.contains('='));
        assert_eq!(decode_component(&encoded), text);
        assert_eq!(encode_component("$main"), "$main");
    }

    #[test]
    fn operation_keeps_remaining_slashes() {
        let req = InvocationRequest::from_strings("Foo/bar/baz", "").unwrap();
        assert_eq!(req.operation(), "bar/baz");
    }

    #[test]
    fn combined_line_parses() {
        let req = InvocationRequest::parse("Foo/bar?long=9").unwrap();
        assert_eq!(req.parameter_types(), vec!["long"]);
        let bare = InvocationRequest::parse("Foo/bar").unwrap();
        assert!(bare.parameters().is_empty());
    }
}
