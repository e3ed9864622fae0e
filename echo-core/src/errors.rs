//! # Errors
//!
//! Structured errors with a status code, a `name` and a kebab-cased
//! `className`. They travel inside `anyhow::Error` and the HTTP adapter
//! decides how to render them.
//!
//! Field-level validation failures are collected with [`FieldErrors`] and
//! attached under `errors` as `{"field": ["message", ...]}`.

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    NotAuthenticated,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Conflict,
    GeneralError,
}

impl ErrorKind {
    /// `(status, name, className)`
    fn meta(&self) -> (u16, &'static str, &'static str) {
        match self {
            ErrorKind::BadRequest => (400, "BadRequest", "bad-request"),
            ErrorKind::NotAuthenticated => (401, "NotAuthenticated", "not-authenticated"),
            ErrorKind::Forbidden => (403, "Forbidden", "forbidden"),
            ErrorKind::NotFound => (404, "NotFound", "not-found"),
            ErrorKind::MethodNotAllowed => (405, "MethodNotAllowed", "method-not-allowed"),
            ErrorKind::Conflict => (409, "Conflict", "conflict"),
            ErrorKind::GeneralError => (500, "GeneralError", "general-error"),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.meta().0
    }

    pub fn name(&self) -> &'static str {
        self.meta().1
    }

    pub fn class_name(&self) -> &'static str {
        self.meta().2
    }
}

/// A structured error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct EchoError {
    pub kind: ErrorKind,
    pub message: String,
    pub errors: Option<Value>,
    pub source: Option<AnyError>,
}

impl EchoError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: None,
            source: None,
        }
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Add one message under `field`, keeping messages already attached.
    pub fn with_field_error(mut self, field: &str, msg: impl Into<String>) -> Self {
        let mut map = match self.errors.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        push_message(&mut map, field, msg.into());
        self.errors = Some(Value::Object(map));
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find an `EchoError` anywhere in the chain of `err`.
    pub fn from_anyhow(err: &AnyError) -> Option<&EchoError> {
        err.chain().find_map(|e| e.downcast_ref::<EchoError>())
    }

    /// Kind of the structured error in `err`, if there is one.
    pub fn kind_of(err: &AnyError) -> Option<ErrorKind> {
        Self::from_anyhow(err).map(|e| e.kind)
    }

    /// Copy safe to hand to clients: the `source` chain is dropped.
    pub fn sanitize_for_client(&self) -> EchoError {
        EchoError {
            kind: self.kind,
            message: self.message.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    /// Field messages flattened in field order, for HTML flash output.
    pub fn field_messages(&self) -> Vec<String> {
        let Some(Value::Object(map)) = &self.errors else {
            return Vec::new();
        };
        map.values()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|m| m.as_str().map(str::to_string))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        let mut base = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });

        if let Some(e) = &self.errors {
            base["errors"] = e.clone();
        }
        base
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn method_not_allowed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotAllowed, msg)
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
}

impl fmt::Display for EchoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for EchoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Collects field-level validation messages.
#[derive(Debug, Default, Clone)]
pub struct FieldErrors {
    map: Map<String, Value>,
}

impl FieldErrors {
    pub fn push(&mut self, field: &str, msg: impl Into<String>) {
        push_message(&mut self.map, field, msg.into());
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.map)
    }

    pub fn into_bad_request(self, message: &str) -> AnyError {
        EchoError::bad_request(message)
            .with_errors(self.into_value())
            .into_anyhow()
    }
}

fn push_message(map: &mut Map<String, Value>, key: &str, msg: String) {
    let msg = Value::String(msg);
    match map.get_mut(key) {
        Some(Value::Array(arr)) => arr.push(msg),
        _ => {
            map.insert(key.to_string(), Value::Array(vec![msg]));
        }
    }
}
