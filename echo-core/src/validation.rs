//! Maps `validator` failures onto field-level `BadRequest` errors.

use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::errors::FieldErrors;

pub const REQUIRED: &str = "This field is required.";

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some(REQUIRED),
        "email" => Some("Enter a valid email address."),
        "length" => Some("Ensure this field has a valid length."),
        "range" => Some("Ensure this value is within range."),
        _ => None,
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn push_validation_errors(out: &mut FieldErrors, prefix: &str, errs: &ValidationErrors) {
    for (field, kind) in errs.errors() {
        let key = join_path(prefix, field);
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for e in field_errors {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(str::to_string))
                        .unwrap_or_else(|| e.code.to_string());
                    out.push(&key, msg);
                }
            }
            ValidationErrorsKind::Struct(nested) => push_validation_errors(out, &key, nested),
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    push_validation_errors(out, &format!("{key}[{idx}]"), nested);
                }
            }
        }
    }
}

/// Run `validator` rules on `value`; failures become `BadRequest(message)`
/// with `errors` keyed by field.
pub fn validate<T: Validate>(value: &T, message: &str) -> anyhow::Result<()> {
    value.validate().map_err(|errs| {
        let mut out = FieldErrors::default();
        push_validation_errors(&mut out, "", &errs);
        out.into_bad_request(message)
    })
}

/// Reject blank required values, reporting every missing field at once.
pub fn require_present(fields: &[(&str, Option<&str>)], message: &str) -> anyhow::Result<()> {
    let mut out = FieldErrors::default();
    for (name, value) in fields {
        if value.map_or(true, |v| v.trim().is_empty()) {
            out.push(name, REQUIRED);
        }
    }
    if out.is_empty() {
        Ok(())
    } else {
        Err(out.into_bad_request(message))
    }
}
