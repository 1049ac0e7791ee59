//! Validation rules.
//!
//! A [`Validator`] inspects a control and returns the errors it finds, keyed by
//! error kind. Errors from every validator on a control are merged. Apart from
//! [`required`], rules treat empty input (null, `""`, `[]`) as valid so they
//! compose with it.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Value, json};

use crate::control::Control;
use crate::status::{UpdateOptions, ValidationErrors};

/// Shared validation rule.
pub type Validator = Arc<dyn Fn(&Control) -> Option<ValidationErrors> + Send + Sync>;

const EMAIL_MAX_LEN: usize = 254;
const EMAIL_LOCAL_MAX_LEN: usize = 64;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"^[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+)*@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"#)
		.expect("email pattern is valid")
});

/// Wraps a closure as a [`Validator`].
pub fn from_fn(f: impl Fn(&Control) -> Option<ValidationErrors> + Send + Sync + 'static) -> Validator {
	Arc::new(f)
}

/// Replaces the validators of `control` and revalidates it immediately.
pub fn set_validators(control: &Control, validators: impl IntoIterator<Item = Validator>) {
	control.set_validators(validators);
	control.update_value_and_validity(UpdateOptions::default());
}

fn single(kind: &str, meta: Value) -> ValidationErrors {
	ValidationErrors::from([(kind.to_string(), meta)])
}

fn is_empty_input(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::String(s) => s.is_empty(),
		Value::Array(items) => items.is_empty(),
		_ => false,
	}
}

fn as_number(value: &Value) -> Option<f64> {
	match value {
		Value::Number(n) => n.as_f64(),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}

fn input_length(value: &Value) -> Option<usize> {
	match value {
		Value::String(s) => Some(s.chars().count()),
		Value::Array(items) => Some(items.len()),
		_ => None,
	}
}

/// Fails with `{"required": true}` on null, `""` or `[]`.
pub fn required() -> Validator {
	Arc::new(|control| is_empty_input(&control.value()).then(|| single("required", Value::Bool(true))))
}

/// Fails when the numeric value is below `min`.
pub fn min(min: f64) -> Validator {
	Arc::new(move |control| {
		let value = control.value();
		if is_empty_input(&value) {
			return None;
		}
		let actual = as_number(&value)?;
		(actual < min).then(|| single("min", json!({ "min": min, "actual": value })))
	})
}

/// Fails when the numeric value is above `max`.
pub fn max(max: f64) -> Validator {
	Arc::new(move |control| {
		let value = control.value();
		if is_empty_input(&value) {
			return None;
		}
		let actual = as_number(&value)?;
		(actual > max).then(|| single("max", json!({ "max": max, "actual": value })))
	})
}

/// Fails when a string or list is shorter than `len`.
pub fn min_length(len: usize) -> Validator {
	Arc::new(move |control| {
		let value = control.value();
		if is_empty_input(&value) {
			return None;
		}
		let actual = input_length(&value)?;
		(actual < len).then(|| single("minlength", json!({ "requiredLength": len, "actualLength": actual })))
	})
}

/// Fails when a string or list is longer than `len`.
pub fn max_length(len: usize) -> Validator {
	Arc::new(move |control| {
		let actual = input_length(&control.value())?;
		(actual > len).then(|| single("maxlength", json!({ "requiredLength": len, "actualLength": actual })))
	})
}

/// Fails with `{"email": true}` when the value is not an email address.
pub fn email() -> Validator {
	Arc::new(|control| {
		let value = control.value();
		if is_empty_input(&value) {
			return None;
		}
		let ok = value.as_str().is_some_and(|s| {
			let local_len = s.split('@').next().map_or(0, str::len);
			s.len() <= EMAIL_MAX_LEN && local_len <= EMAIL_LOCAL_MAX_LEN && EMAIL.is_match(s)
		});
		(!ok).then(|| single("email", Value::Bool(true)))
	})
}

/// Fails when a string value does not match `regex`.
pub fn pattern(regex: Regex) -> Validator {
	Arc::new(move |control| {
		let value = control.value();
		if is_empty_input(&value) {
			return None;
		}
		let ok = value.as_str().is_some_and(|s| regex.is_match(s));
		(!ok).then(|| single("pattern", json!({ "requiredPattern": regex.as_str(), "actualValue": value })))
	})
}

/// Compiles `source` anchored at both ends and builds a [`pattern`] validator.
pub fn pattern_str(source: &str) -> Result<Validator, regex::Error> {
	let mut anchored = String::with_capacity(source.len() + 2);
	if !source.starts_with('^') {
		anchored.push('^');
	}
	anchored.push_str(source);
	if !source.ends_with('$') {
		anchored.push('$');
	}
	Regex::new(&anchored).map(pattern)
}
