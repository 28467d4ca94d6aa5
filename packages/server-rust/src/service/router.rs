//! Invocation routing: turns a classified request into a console response.
//!
//! Every request follows the same shape: parse, look up in the catalog,
//! coerce arguments, run through the execution delegate, register a non-null
//! result, render. Failures before the operation runs become error responses.
//! The operation's own failure is a normal result page.

use std::fmt::Write;
use std::sync::Arc;

use objscope_core::render::{escape_html, render, render_failure};
use objscope_core::request::encode_component;
use objscope_core::{
    InvocationRequest, ObjectRegistry, OperationCatalog, ReferenceToken, TypeEntry, Value,
    ValueCoercer, BUILTIN_TYPE_NAMES,
};
use tracing::{debug, warn};

use super::classify::classify;
use super::delegate::{DelegateError, ExecutionDelegate};
use super::operation::{ConsoleOperation, ConsoleResponse, RouteError};

// ---------------------------------------------------------------------------
// InvocationRouter
// ---------------------------------------------------------------------------

/// Answers console requests against one catalog, registry and delegate.
///
/// Stateless apart from the registry; safe to share across request threads.
pub struct InvocationRouter {
    catalog: Arc<dyn OperationCatalog>,
    registry: Arc<ObjectRegistry>,
    coercer: ValueCoercer,
    delegate: Arc<dyn ExecutionDelegate>,
    root_type: String,
}

impl InvocationRouter {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn OperationCatalog>,
        registry: Arc<ObjectRegistry>,
        delegate: Arc<dyn ExecutionDelegate>,
        root_type: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            coercer: ValueCoercer::new(Arc::clone(&registry)),
            registry,
            delegate,
            root_type: root_type.into(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// Classifies and answers a raw request. Blocks while the delegate runs
    /// the operation.
    #[must_use]
    pub fn handle(&self, path: &str, query: Option<&str>) -> ConsoleResponse {
        self.dispatch(classify(path, query))
    }

    /// Answers an already classified request.
    #[must_use]
    pub fn dispatch(&self, operation: ConsoleOperation) -> ConsoleResponse {
        let result = match operation {
            ConsoleOperation::RootRedirect => Ok(ConsoleResponse::redirect(format!(
                "/{}",
                encode_component(&self.root_type)
            ))),
            ConsoleOperation::Members {
                type_name,
                receiver,
            } => self.members(&type_name, receiver.as_deref()),
            ConsoleOperation::Call { path, query } => self.call(&path, &query),
            ConsoleOperation::GetField { path, receiver } => {
                self.get_field(&path, receiver.as_deref())
            }
            ConsoleOperation::Persist { token, name } => self.persist(&token, name.as_deref()),
            ConsoleOperation::Resolve { token } => self.resolve(&token),
            ConsoleOperation::Unrouted { path } => Err(RouteError::Unrouted(path)),
        };
        result.unwrap_or_else(|err| {
            debug!(error = %err, status = ?err.status(), "request rejected");
            err.into()
        })
    }

    /// Invokes an operation. `query` is the request grammar's query part.
    ///
    /// # Errors
    ///
    /// Any failure before the operation runs, or an unavailable delegate.
    pub fn call(&self, path: &str, query: &str) -> Result<ConsoleResponse, RouteError> {
        let request = InvocationRequest::from_strings(path, query)?;
        let type_entry = self.lookup_type(request.target_type())?;
        let parameter_types = request.parameter_types();
        let operation = type_entry
            .find_operation(request.operation(), &parameter_types)
            .ok_or_else(|| RouteError::UnknownOperation {
                name: request.operation().to_string(),
                parameter_types: parameter_types.join(", "),
            })?
            .clone();

        let receiver = if operation.descriptor().is_static {
            None
        } else {
            Some(
                self.coercer
                    .coerce_receiver(request.receiver(), request.target_type())?,
            )
        };
        let arguments = request
            .parameters()
            .iter()
            .map(|p| self.coercer.coerce(p.raw.as_deref(), &p.type_name))
            .collect::<Result<Vec<_>, _>>()?;

        let description = operation.descriptor().to_string();
        debug!(operation = %description, "invoking");
        let outcome = self
            .delegate
            .delegate(Box::new(move || operation.invoke(receiver.as_ref(), &arguments)));
        self.result_page(&description, outcome)
    }

    /// Reads a field, optionally on a receiver.
    ///
    /// # Errors
    ///
    /// Any failure before the read runs, or an unavailable delegate.
    pub fn get_field(
        &self,
        path: &str,
        receiver: Option<&str>,
    ) -> Result<ConsoleResponse, RouteError> {
        let trimmed = path.trim_start_matches('/');
        let (type_name, field_name) = trimmed
            .split_once('/')
            .filter(|(t, f)| !t.is_empty() && !f.is_empty())
            .ok_or_else(|| objscope_core::RequestFormatError {
                input: path.to_string(),
                reason: "expected /<Type>/<field>",
            })?;
        let field = self
            .lookup_type(type_name)?
            .find_field(field_name)
            .ok_or_else(|| RouteError::UnknownField(field_name.to_string()))?
            .clone();

        let receiver = if field.descriptor().is_static {
            None
        } else {
            Some(self.coercer.coerce_receiver(receiver, type_name)?)
        };

        let description = field.descriptor().to_string();
        let outcome = self
            .delegate
            .delegate(Box::new(move || field.read(receiver.as_ref())));
        self.result_page(&description, outcome)
    }

    /// Promotes `[<uuid>]` under `name`, or a generated name, then redirects
    /// to the persistent reference.
    ///
    /// # Errors
    ///
    /// A malformed token or empty name, or an entry that no longer exists.
    pub fn persist(&self, token: &str, name: Option<&str>) -> Result<ConsoleResponse, RouteError> {
        let id = ReferenceToken::parse_ephemeral(token)?;
        let name = match name {
            Some("") => return Err(RouteError::EmptyName),
            Some(name) => {
                self.registry.promote(&id, name)?;
                name.to_string()
            }
            None => self.registry.promote_auto(&id)?,
        };
        let persistent = ReferenceToken::Persistent(name);
        let value = self.registry.resolve(&persistent)?;
        debug!(from = %token, to = %persistent, "promoted");
        Ok(ConsoleResponse::redirect(object_url(&value, &persistent)))
    }

    /// Redirects a bare token to the members page of the value it names.
    ///
    /// # Errors
    ///
    /// A malformed token, or one naming no live entry.
    pub fn resolve(&self, token: &str) -> Result<ConsoleResponse, RouteError> {
        let token: ReferenceToken = token.parse()?;
        let value = self.registry.resolve(&token)?;
        Ok(ConsoleResponse::redirect(object_url(&value, &token)))
    }

    /// Lists a type's operations and fields with ready-made call links,
    /// scoped to `receiver` when one is given.
    ///
    /// Built-in value kinds missing from the catalog get a page with no
    /// members, so every result link lands somewhere.
    ///
    /// # Errors
    ///
    /// Unknown type.
    pub fn members(
        &self,
        type_name: &str,
        receiver: Option<&str>,
    ) -> Result<ConsoleResponse, RouteError> {
        match self.lookup_type(type_name) {
            Ok(entry) => Ok(ConsoleResponse::html(members_page(
                entry.name(),
                Some(entry),
                receiver,
            ))),
            Err(_) if BUILTIN_TYPE_NAMES.contains(&type_name) => Ok(ConsoleResponse::html(
                members_page(type_name, None, receiver),
            )),
            Err(err) => Err(err),
        }
    }

    fn lookup_type(&self, type_name: &str) -> Result<&TypeEntry, RouteError> {
        self.catalog
            .lookup_type(type_name)
            .ok_or_else(|| RouteError::UnknownType(type_name.to_string()))
    }

    fn result_page(
        &self,
        description: &str,
        outcome: Result<Value, DelegateError>,
    ) -> Result<ConsoleResponse, RouteError> {
        let (line, link) = match outcome {
            Ok(value) => {
                let link = if value.is_null() {
                    String::new()
                } else {
                    let token = ReferenceToken::Ephemeral(self.registry.add(value.clone()));
                    object_link(&value, &token)
                };
                (format!("{} = {}", escape_html(description), render(&value)), link)
            }
            Err(DelegateError::Raised(err)) => {
                debug!(operation = %description, error = %err, "operation raised");
                (
                    format!("{} !! {}", escape_html(description), render_failure(&err)),
                    String::new(),
                )
            }
            Err(err @ DelegateError::Unavailable { .. }) => {
                warn!(operation = %description, error = %err, "execution context unavailable");
                return Err(RouteError::Delegate(err));
            }
        };
        Ok(ConsoleResponse::html(format!(
            "<html><body><p>{line}</p><p>{link}</p></body></html>"
        )))
    }
}

impl std::fmt::Debug for InvocationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationRouter")
            .field("root_type", &self.root_type)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Page building
// ---------------------------------------------------------------------------

/// `/<Type>?<token>`
fn object_url(value: &Value, token: &ReferenceToken) -> String {
    format!(
        "/{}?{}",
        encode_component(value.type_name()),
        encode_component(&token.to_string())
    )
}

fn object_link(value: &Value, token: &ReferenceToken) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        escape_html(&object_url(value, token)),
        escape_html(&token.to_string())
    )
}

fn members_page(type_name: &str, entry: Option<&TypeEntry>, receiver: Option<&str>) -> String {
    let type_path = encode_component(type_name);
    let this = receiver.map(|r| encode_component(r).into_owned());

    let mut page = String::from("<html><body>");
    let _ = write!(page, "<h1>{}</h1>", escape_html(type_name));
    if let Some(token) = receiver {
        let _ = write!(page, "<p>this = {}", escape_html(token));
        if token.starts_with('[') {
            let _ = write!(
                page,
                " <a href=\"/{}?persist\">persist</a>",
                escape_html(&encode_component(token))
            );
        }
        page.push_str("</p>");
    }

    page.push_str("<ul class=\"operations\">");
    for operation in entry.into_iter().flat_map(TypeEntry::operations) {
        let descriptor = operation.descriptor();
        let mut url = format!(
            "/{type_path}/{}?call",
            encode_component(&descriptor.name)
        );
        if !descriptor.is_static {
            url.push_str("&this");
            if let Some(this) = &this {
                let _ = write!(url, "={this}");
            }
        }
        for parameter in &descriptor.parameter_types {
            let _ = write!(url, "&{}", encode_component(parameter));
        }
        let _ = write!(
            page,
            "<li>{} <a href=\"{}\">call</a></li>",
            escape_html(&descriptor.to_string()),
            escape_html(&url)
        );
    }
    page.push_str("</ul><ul class=\"fields\">");
    for field in entry.into_iter().flat_map(TypeEntry::fields) {
        let descriptor = field.descriptor();
        let mut url = format!("/{type_path}/{}?get", encode_component(&descriptor.name));
        if !descriptor.is_static {
            match &this {
                Some(this) => url.push_str(this),
                None => {
                    let _ = write!(page, "<li>{}</li>", escape_html(&descriptor.to_string()));
                    continue;
                }
            }
        }
        let _ = write!(
            page,
            "<li>{} <a href=\"{}\">get</a></li>",
            escape_html(&descriptor.to_string()),
            escape_html(&url)
        );
    }
    page.push_str("</ul></body></html>");
    page
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use uuid::Uuid;

    use super::*;
    use crate::demo::{self, Counter};
    use crate::service::delegate::{AffinityDelegate, InlineDelegate};
    use crate::service::operation::ResponseStatus;

    fn router() -> InvocationRouter {
        InvocationRouter::new(
            Arc::new(demo::catalog()),
            Arc::new(ObjectRegistry::new()),
            Arc::new(InlineDelegate),
            demo::SYSTEM,
        )
    }

    /// Pulls the ephemeral token out of a result page link.
    fn linked_token(body: &str) -> Option<String> {
        let start = body.find(">[")? + 1;
        let end = body[start..].find("]<")? + start + 1;
        Some(body[start..end].to_string())
    }

    /// Follows a `/<Type>?<token>` link or redirect target.
    fn follow(router: &InvocationRouter, url: &str) -> ConsoleResponse {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        router.handle(path, Some(query))
    }

    fn linked_href(body: &str) -> Option<String> {
        let start = body.find("href=\"")? + "href=\"".len();
        let end = body[start..].find('"')? + start;
        Some(body[start..end].to_string())
    }

    #[test]
    fn root_redirects_to_root_type() {
        let response = router().handle("/", None);
        assert_eq!(response.status, ResponseStatus::Redirect);
        assert_eq!(response.location.as_deref(), Some("/System"));
    }

    #[test]
    fn static_call_renders_result_and_link() {
        let response = router().handle("/System/concat", Some("call&string=a%26&string=<b>"));
        assert_eq!(response.status, ResponseStatus::Ok);
        assert!(response
            .body
            .starts_with("<html><body><p>static string System.concat(string, string) = a&#38;&#60;b&#62;</p>"));
        let token = linked_token(&response.body).unwrap();
        assert!(token.parse::<ReferenceToken>().is_ok());
        assert!(response.body.contains("href=\"/string?["));
    }

    #[test]
    fn null_result_has_no_link() {
        let response = router().handle("/System/nothing", Some("call"));
        assert_eq!(response.status, ResponseStatus::Ok);
        assert!(response.body.contains("= null</p><p></p>"));
    }

    #[test]
    fn repeated_calls_register_distinct_entries() {
        let router = router();
        let tokens: HashSet<_> = (0..3)
            .map(|_| {
                let response = router.handle("/System/new_counter", Some("call&int=1"));
                linked_token(&response.body).unwrap()
            })
            .collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(router.registry().ephemeral_len(), 3);
    }

    #[test]
    fn instance_call_through_ephemeral_reference() {
        let router = router();
        let created = router.handle("/System/new_counter", Some("call&int=5"));
        let token = linked_token(&created.body).unwrap();

        let added = router.handle("/Counter/add", Some(&format!("call&this={token}&int=3")));
        assert_eq!(added.status, ResponseStatus::Ok);
        assert!(added.body.contains("int Counter.add(int) = 8"));

        let read = router.handle("/Counter/value", Some(&format!("get{token}")));
        assert!(read.body.contains("int Counter.value = 8"));
    }

    #[test]
    fn raised_failure_is_reported_inline() {
        let response = router().handle("/System/fail", Some("call&string=no%20%3Cway%3E"));
        assert_eq!(response.status, ResponseStatus::Ok);
        assert!(response.body.contains("!! no &#60;way&#62;"));
        assert!(response.body.ends_with("<p></p></body></html>"));
    }

    #[test]
    fn malformed_argument_is_bad_request() {
        let response = router().handle("/System/new_counter", Some("call&int=abc"));
        assert_eq!(response.status, ResponseStatus::BadRequest);
    }

    #[test]
    fn missing_things_are_not_found() {
        let router = router();
        assert_eq!(router.handle("/Nope/x", Some("call")).status, ResponseStatus::NotFound);
        assert_eq!(
            router.handle("/System/concat", Some("call&int=1")).status,
            ResponseStatus::NotFound
        );
        assert_eq!(
            router.handle("/System/nope", Some("get")).status,
            ResponseStatus::NotFound
        );
        let ghost = format!("[{}]", Uuid::new_v4());
        assert_eq!(
            router
                .handle("/Counter/get", Some(&format!("call&this={ghost}")))
                .status,
            ResponseStatus::NotFound
        );
        assert_eq!(router.handle("/Nope", None).status, ResponseStatus::NotFound);
        assert_eq!(router.handle("/System/concat", None).status, ResponseStatus::NotFound);
    }

    #[test]
    fn instance_call_without_receiver_is_bad_request() {
        let response = router().handle("/Counter/get", Some("call&this"));
        assert_eq!(response.status, ResponseStatus::BadRequest);
    }

    #[test]
    fn persist_then_resolve_by_name() {
        let router = router();
        let created = router.handle("/System/new_counter", Some("call&int=2"));
        let token = linked_token(&created.body).unwrap();

        let persisted = router.handle(&format!("/{token}"), Some("persist=main"));
        assert_eq!(persisted.status, ResponseStatus::Redirect);
        assert_eq!(persisted.location.as_deref(), Some("/Counter?$main"));

        let resolved = router.handle("/$main", None);
        assert_eq!(resolved.location.as_deref(), Some("/Counter?$main"));

        let call = router.handle("/Counter/increment", Some("call&this=$main"));
        assert!(call.body.contains("= 3"));
    }

    #[test]
    fn persist_without_name_generates_one() {
        let router = router();
        let created = router.handle("/System/new_counter", Some("call&int=0"));
        let token = linked_token(&created.body).unwrap();
        let persisted = router.handle(&format!("/{token}"), Some("persist"));
        let location = persisted.location.unwrap();
        assert!(location.starts_with("/Counter?$o"));
        assert_eq!(router.registry().persistent_len(), 1);
    }

    #[test]
    fn persist_rejects_bad_input() {
        let router = router();
        assert_eq!(
            router.handle("/[nope]", Some("persist")).status,
            ResponseStatus::BadRequest
        );
        let ghost = format!("/[{}]", Uuid::new_v4());
        assert_eq!(router.handle(&ghost, Some("persist")).status, ResponseStatus::NotFound);
        let id = router.registry().add(Value::I32(1));
        assert_eq!(
            router.handle(&format!("/[{id}]"), Some("persist=")).status,
            ResponseStatus::BadRequest
        );
    }

    #[test]
    fn members_page_links_operations_and_fields() {
        let router = router();
        let page = router.handle("/System", None);
        assert_eq!(page.status, ResponseStatus::Ok);
        assert!(page.body.contains("href=\"/System/concat?call&#38;string&#38;string\""));
        assert!(page.body.contains("href=\"/System/version?get\""));

        let counter = router.handle("/Counter", Some("$main"));
        assert!(counter.body.contains("href=\"/Counter/add?call&#38;this=$main&#38;int\""));
        assert!(counter.body.contains("href=\"/Counter/value?get$main\""));
        assert!(!counter.body.contains("persist"));
    }

    #[test]
    fn members_page_offers_persist_for_ephemeral_receiver() {
        let router = router();
        let id = router.registry().add(Value::object(Counter::new(1)));
        let page = router.handle("/Counter", Some(&format!("[{id}]")));
        assert!(page.body.contains(&format!("href=\"/[{id}]?persist\"")));
    }

    #[test]
    fn static_field_reads_without_receiver() {
        let response = router().handle("/System/version", Some("get"));
        assert!(response.body.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn self_containing_array_renders_truncated() {
        let router = router();
        let created = router.handle("/System/range", Some("call&int=2"));
        let token = linked_token(&created.body).unwrap();
        let response = router.handle(
            "/System/array_set",
            Some(&format!("call&array={token}&int=1&array={token}")),
        );
        assert_eq!(response.status, ResponseStatus::Ok);
        assert!(response.body.contains("[...]"));
    }

    #[test]
    fn oversized_range_fails_inline() {
        let router = router();
        let response = router.handle(
            "/System/range",
            Some(&format!("call&int={}", demo::MAX_RANGE + 1)),
        );
        assert_eq!(response.status, ResponseStatus::Ok);
        assert!(response.body.contains("!! range length"));
        assert_eq!(router.registry().ephemeral_len(), 0);

        let largest = router.handle("/System/range", Some("call&int=2147483647"));
        assert!(largest.body.contains("!!"));
    }

    #[test]
    fn result_links_resolve_for_every_value_kind() {
        let router = router();
        for (path, query, type_name) in [
            ("/System/concat", "call&string=a&string=b", "string"),
            ("/System/range", "call&int=3", "array"),
            ("/System/uptime_millis", "call", "i64"),
            ("/System/new_counter", "call&int=1", "Counter"),
        ] {
            let result = router.handle(path, Some(query));
            let href = linked_href(&result.body).unwrap();
            assert!(href.starts_with(&format!("/{type_name}?[")), "{href}");

            let page = follow(&router, &href);
            assert_eq!(page.status, ResponseStatus::Ok, "{href}");
            assert!(page.body.contains(&format!("<h1>{type_name}</h1>")));
            assert!(page.body.contains("persist</a>"));
        }
    }

    #[test]
    fn builtin_members_page_lists_nothing() {
        let router = router();
        let id = router.registry().add(Value::from("text"));
        let page = router.handle("/string", Some(&format!("[{id}]")));
        assert_eq!(page.status, ResponseStatus::Ok);
        assert!(page
            .body
            .contains("<ul class=\"operations\"></ul><ul class=\"fields\"></ul>"));
        assert_eq!(router.handle("/null", None).status, ResponseStatus::NotFound);
    }

    #[test]
    fn persisted_string_redirect_lands_on_page() {
        let router = router();
        let created = router.handle("/System/concat", Some("call&string=x&string=y"));
        let token = linked_token(&created.body).unwrap();

        let persisted = router.handle(&format!("/{token}"), Some("persist=greeting"));
        let location = persisted.location.unwrap();
        assert_eq!(location, "/string?$greeting");
        assert_eq!(follow(&router, &location).status, ResponseStatus::Ok);

        let resolved = router.handle("/$greeting", None);
        let location = resolved.location.unwrap();
        assert_eq!(follow(&router, &location).status, ResponseStatus::Ok);
    }

    #[test]
    fn affinity_delegate_runs_calls_on_designated_thread() {
        let (delegate, handle) = AffinityDelegate::spawn_thread("console-owner", 4).unwrap();
        let router = InvocationRouter::new(
            Arc::new(demo::catalog()),
            Arc::new(ObjectRegistry::new()),
            Arc::new(delegate),
            demo::SYSTEM,
        );
        let response = router.handle("/System/thread_name", Some("call"));
        assert!(response.body.contains("= console-owner"));
        drop(router);
        handle.join().unwrap();
    }

    #[test]
    fn unavailable_delegate_is_internal_error() {
        let (delegate, queue) = AffinityDelegate::channel(1);
        drop(queue);
        let router = InvocationRouter::new(
            Arc::new(demo::catalog()),
            Arc::new(ObjectRegistry::new()),
            Arc::new(delegate),
            demo::SYSTEM,
        );
        let response = router.handle("/System/nothing", Some("call"));
        assert_eq!(response.status, ResponseStatus::InternalError);
    }
}
