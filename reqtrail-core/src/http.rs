// HTTP request and response types

use crate::files::FileInput;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Authenticated principal attached to a request by the host's auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
}

impl AuthUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Authenticated-user slot shared by a request and every clone of it.
///
/// Middleware further down the chain owns the request by value; an
/// outer middleware holding the slot still sees a user attached there.
#[derive(Debug, Clone, Default)]
pub struct UserSlot(Arc<RwLock<Option<AuthUser>>>);

impl UserSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<AuthUser> {
        self.0.read().clone()
    }

    pub fn set(&self, user: AuthUser) {
        *self.0.write() = Some(user);
    }

    pub fn clear(&self) {
        *self.0.write() = None;
    }
}

/// HTTP request wrapper
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Query string parameters in the order they were received
    pub query_params: Vec<(String, String)>,
    /// Top-level upload fields in declaration order
    pub files: Vec<(String, FileInput)>,
    /// Socket peer address as reported by the host
    pub remote_addr: Option<String>,
    user: UserSlot,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: Vec::new(),
            query_params: Vec::new(),
            files: Vec::new(),
            remote_addr: None,
            user: UserSlot::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Serialize `value` as the JSON body and set the content type
    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, crate::Error> {
        self.body =
            serde_json::to_vec(value).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        Ok(self.with_header("Content-Type", "application/json"))
    }

    /// Encode `fields` as an url-encoded form body and set the content type
    pub fn with_form<K, V>(mut self, fields: &[(K, V)]) -> Result<Self, crate::Error>
    where
        K: Serialize,
        V: Serialize,
    {
        let encoded = serde_urlencoded::to_string(fields)
            .map_err(|e| crate::Error::Serialization(e.to_string()))?;
        self.body = encoded.into_bytes();
        Ok(self.with_header("Content-Type", "application/x-www-form-urlencoded"))
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    pub fn with_file(mut self, field: impl Into<String>, input: impl Into<FileInput>) -> Self {
        self.files.push((field.into(), input.into()));
        self
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Attach the authenticated user; visible through every clone of the slot
    pub fn with_user(self, user: AuthUser) -> Self {
        self.user.set(user);
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, crate::Error> {
        serde_json::from_slice(&self.body).map_err(|e| crate::Error::Deserialization(e.to_string()))
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the body is declared as JSON (`*/json` or `*+json`)
    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(is_json_media_type)
    }

    pub fn is_form(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.contains("application/x-www-form-urlencoded"))
    }

    /// Request input: query parameters merged with the body fields.
    ///
    /// Body fields win on key collision. A JSON body that decodes to
    /// something other than an object is returned as-is. Bodies that cannot
    /// be decoded contribute nothing.
    ///
    /// Form bodies decode as flat string pairs: a bracketed key such as
    /// `user[password]` stays a literal top-level key, so it is redacted by
    /// naming `user[password]`, not the `user.password` path.
    pub fn input(&self) -> Value {
        let mut input: Map<String, Value> = self
            .query_params
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();

        if self.body.is_empty() {
            return Value::Object(input);
        }

        if self.is_json() {
            match serde_json::from_slice::<Value>(&self.body) {
                Ok(Value::Object(fields)) => input.extend(fields),
                Ok(other) => return other,
                Err(_) => {}
            }
        } else if self.is_form() {
            if let Ok(fields) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&self.body) {
                input.extend(
                    fields
                        .into_iter()
                        .map(|(key, value)| (key, Value::String(value))),
                );
            }
        }

        Value::Object(input)
    }

    /// Client address: `X-Forwarded-For`, then `X-Real-IP`, then the peer address
    pub fn ip(&self) -> String {
        if let Some(forwarded) = self.header("x-forwarded-for") {
            return forwarded
                .split(',')
                .next()
                .unwrap_or(forwarded)
                .trim()
                .to_string();
        }

        if let Some(real_ip) = self.header("x-real-ip") {
            return real_ip.trim().to_string();
        }

        self.remote_addr.clone().unwrap_or_default()
    }

    pub fn is_xhr(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    pub fn is_pjax(&self) -> bool {
        self.header("x-pjax").is_some()
    }

    /// Whether the first acceptable media type is JSON
    pub fn wants_json(&self) -> bool {
        self.header("accept")
            .and_then(|accept| accept.split(',').next())
            .is_some_and(is_json_media_type)
    }

    pub fn accepts_any_content_type(&self) -> bool {
        match self.header("accept") {
            None => true,
            Some(accept) => {
                let first = accept.split(',').next().unwrap_or("").trim();
                let media = first.split(';').next().unwrap_or("").trim();
                media.is_empty() || media == "*/*" || media == "*"
            }
        }
    }

    /// Whether the client expects a JSON response
    pub fn expects_json(&self) -> bool {
        (self.is_xhr() && !self.is_pjax() && self.accepts_any_content_type()) || self.wants_json()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.user.get()
    }

    /// Handle to the user slot, for reading the user after the request is handed on
    pub fn user_slot(&self) -> UserSlot {
        self.user.clone()
    }
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn created() -> Self {
        Self::new(201)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    /// JSON response with status 200
    pub fn json<T: Serialize>(value: &T) -> Result<Self, crate::Error> {
        Self::ok().with_json(value)
    }

    pub fn html(markup: impl Into<String>) -> Self {
        Self::ok()
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(markup.into().into_bytes())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::ok()
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(text.into().into_bytes())
    }

    /// Temporary redirect (302)
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(302).with_header("Location", location)
    }

    /// Permanent redirect (301)
    pub fn redirect_permanent(location: impl Into<String>) -> Self {
        Self::new(301).with_header("Location", location)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, crate::Error> {
        self.body =
            serde_json::to_vec(value).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Redirect target carried in the `Location` header
    pub fn target_url(&self) -> Option<&str> {
        self.header("location")
    }

    /// Body as text, replacing invalid UTF-8 sequences
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    if let Some(value) = headers.get(name) {
        return Some(value.as_str());
    }
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn is_json_media_type(media: &str) -> bool {
    let media = media.split(';').next().unwrap_or("").trim();
    media.contains("/json") || media.contains("+json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UploadedFile;
    use serde_json::json;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = HttpRequest::new("GET", "/").with_header("Content-Type", "application/json");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert!(req.is_json());
    }

    #[test]
    fn test_input_merges_query_and_json_body() {
        let req = HttpRequest::new("POST", "/users")
            .with_query("page", "2")
            .with_json(&json!({"name": "alice", "page": "3"}))
            .unwrap();

        let input = req.input();
        assert_eq!(input["name"], "alice");
        assert_eq!(input["page"], "3");
    }

    #[test]
    fn test_input_decodes_form_body() {
        let req = HttpRequest::new("POST", "/login")
            .with_form(&[("foo", "bar"), ("password", "x")])
            .unwrap();

        let input = req.input();
        assert_eq!(
            serde_json::to_string(&input).unwrap(),
            r#"{"foo":"bar","password":"x"}"#
        );
    }

    #[test]
    fn test_input_keeps_non_object_json() {
        let req = HttpRequest::new("POST", "/batch")
            .with_json(&json!([1, 2, 3]))
            .unwrap();
        assert_eq!(req.input(), json!([1, 2, 3]));
    }

    #[test]
    fn test_input_ignores_undecodable_body() {
        let req = HttpRequest::new("POST", "/")
            .with_header("Content-Type", "application/json")
            .with_body(b"{not json".to_vec());
        assert_eq!(req.input(), json!({}));
    }

    #[test]
    fn test_ip_resolution_order() {
        let req = HttpRequest::new("GET", "/").with_remote_addr("10.0.0.1");
        assert_eq!(req.ip(), "10.0.0.1");

        let req = req.with_header("X-Real-IP", "10.0.0.2");
        assert_eq!(req.ip(), "10.0.0.2");

        let req = req.with_header("X-Forwarded-For", "203.0.113.9, 10.0.0.2");
        assert_eq!(req.ip(), "203.0.113.9");

        assert_eq!(HttpRequest::new("GET", "/").ip(), "");
    }

    #[test]
    fn test_expects_json() {
        let plain = HttpRequest::new("GET", "/");
        assert!(!plain.expects_json());

        let accept = HttpRequest::new("GET", "/").with_header("Accept", "application/json");
        assert!(accept.expects_json());

        let vendor =
            HttpRequest::new("GET", "/").with_header("Accept", "application/vnd.api+json, */*");
        assert!(vendor.expects_json());

        let html_first =
            HttpRequest::new("GET", "/").with_header("Accept", "text/html, application/json");
        assert!(!html_first.expects_json());

        let xhr = HttpRequest::new("GET", "/").with_header("X-Requested-With", "XMLHttpRequest");
        assert!(xhr.expects_json());

        let pjax = xhr.clone().with_header("X-PJAX", "true");
        assert!(!pjax.expects_json());
    }

    #[test]
    fn test_form_bracket_keys_stay_flat() {
        let req = HttpRequest::new("POST", "/profile")
            .with_form(&[("user[name]", "ann"), ("user[password]", "x")])
            .unwrap();

        assert_eq!(
            req.input(),
            json!({"user[name]": "ann", "user[password]": "x"})
        );
    }

    #[test]
    fn test_user_slot_is_shared_with_handed_on_request() {
        let req = HttpRequest::new("GET", "/account");
        let slot = req.user_slot();
        assert_eq!(slot.get(), None);

        let downstream = req.with_user(AuthUser::new("42"));
        assert_eq!(slot.get(), Some(AuthUser::new("42")));
        assert_eq!(downstream.user().map(|user| user.id), Some("42".to_string()));

        slot.clear();
        assert_eq!(downstream.user(), None);
    }

    #[test]
    fn test_request_files() {
        let req = HttpRequest::new("POST", "/upload")
            .with_file("avatar", UploadedFile::new("avatar.jpg", "image/jpeg", 10));
        assert_eq!(req.files.len(), 1);
        assert_eq!(req.files[0].0, "avatar");
    }

    #[test]
    fn test_response_redirect() {
        let response = HttpResponse::redirect("https://example.com/next");
        assert!(response.is_redirection());
        assert_eq!(response.target_url(), Some("https://example.com/next"));

        assert!(!HttpResponse::ok().is_redirection());
        assert_eq!(HttpResponse::ok().target_url(), None);
    }

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse::json(&json!({"package": "reqtrail"})).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.body_text(), r#"{"package":"reqtrail"}"#);

        let response = HttpResponse::html("<div>reqtrail</div>");
        assert_eq!(response.body_text(), "<div>reqtrail</div>");
    }
}
