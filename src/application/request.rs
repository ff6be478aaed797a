//! Read-only view of the live request's parameters.

use std::collections::HashMap;

use url::form_urlencoded;

/// Name → text lookup over the incoming request.
pub trait RequestParams: Send + Sync {
    /// Text value of `name`, or `None` when the request does not carry it.
    fn text(&self, name: &str) -> Option<String>;

    /// Like [`RequestParams::text`] but treats a missing parameter as empty.
    fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default()
    }
}

impl RequestParams for HashMap<String, String> {
    fn text(&self, name: &str) -> Option<String> {
        self.get(name).map(|value| normalize_text(value))
    }
}

/// Parameters merged from the query string and a urlencoded form body.
///
/// Body values win over query values of the same name. When a name repeats
/// within one source the last occurrence is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: HashMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string, with or without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::new();
        params.merge_urlencoded(query.strip_prefix('?').unwrap_or(query));
        params
    }

    /// Overlay the values of an `application/x-www-form-urlencoded` body.
    pub fn with_form_body(mut self, body: &[u8]) -> Self {
        for (name, value) in form_urlencoded::parse(body) {
            self.values.insert(name.into_owned(), value.into_owned());
        }
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn merge_urlencoded(&mut self, input: &str) {
        for (name, value) in form_urlencoded::parse(input.as_bytes()) {
            self.values.insert(name.into_owned(), value.into_owned());
        }
    }
}

impl RequestParams for QueryParams {
    fn text(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|value| normalize_text(value))
    }
}

fn normalize_text(value: &str) -> String {
    value.replace("\r\n", "\n")
}
