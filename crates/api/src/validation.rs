//! Request payload validation.
//!
//! Each validator takes the raw JSON body and either returns the typed
//! request or every field error it found.

use std::collections::BTreeMap;

use checkout::CheckoutRequest;
use common::ProductId;
use serde::Serialize;
use serde_json::{Map, Value};

/// Field name to messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// A validated add-to-cart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddItem {
    pub product_id: ProductId,
    pub count: i32,
}

/// Validates `{productId, count}` with `count >= 1`.
pub fn validate_add_item(body: &Value) -> Result<AddItem, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let Some(body) = as_object(body, &mut errors) else {
        return Err(errors);
    };

    let product_id = product_id(body.get("productId"), &mut errors);
    let count = count(body.get("count"), 1, &mut errors);

    errors.into_result(|| AddItem {
        product_id: product_id.unwrap_or_default(),
        count: count.unwrap_or_default(),
    })
}

/// Validates `{count}` with `count >= 0`; zero removes the item.
pub fn validate_set_count(body: &Value) -> Result<i32, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let Some(body) = as_object(body, &mut errors) else {
        return Err(errors);
    };

    let count = count(body.get("count"), 0, &mut errors);
    errors.into_result(|| count.unwrap_or_default())
}

/// Validates `{payment: {method}, delivery: {address, firstName, lastName,
/// comment?}, comments?}`.
pub fn validate_checkout(body: &Value) -> Result<CheckoutRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let Some(body) = as_object(body, &mut errors) else {
        return Err(errors);
    };

    match body.get("payment") {
        Some(Value::Object(payment)) => {
            required_string(payment, "payment", "method", &mut errors);
        }
        _ => errors.add("payment", "must be an object"),
    }

    match body.get("delivery") {
        Some(Value::Object(delivery)) => {
            for field in ["address", "firstName", "lastName"] {
                required_string(delivery, "delivery", field, &mut errors);
            }
            optional_string(delivery.get("comment"), "delivery.comment", &mut errors);
        }
        _ => errors.add("delivery", "must be an object"),
    }

    let comments = optional_string(body.get("comments"), "comments", &mut errors);

    errors.into_result(|| CheckoutRequest {
        payment: body.get("payment").cloned().unwrap_or_default(),
        delivery: body.get("delivery").cloned().unwrap_or_default(),
        comments,
    })
}

/// Validates an order PATCH body and returns its fields.
pub fn validate_order_patch(body: &Value) -> Result<&Map<String, Value>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    match as_object(body, &mut errors) {
        Some(fields) if fields.is_empty() => {
            errors.add("body", "must contain at least one field");
            Err(errors)
        }
        Some(fields) => Ok(fields),
        None => Err(errors),
    }
}

fn as_object<'a>(body: &'a Value, errors: &mut ValidationErrors) -> Option<&'a Map<String, Value>> {
    let object = body.as_object();
    if object.is_none() {
        errors.add("body", "must be a JSON object");
    }
    object
}

fn product_id(value: Option<&Value>, errors: &mut ValidationErrors) -> Option<ProductId> {
    match value {
        Some(Value::String(s)) => match s.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("productId", "must be a UUID");
                None
            }
        },
        Some(_) => {
            errors.add("productId", "must be a string");
            None
        }
        None => {
            errors.add("productId", "is required");
            None
        }
    }
}

fn count(value: Option<&Value>, min: i64, errors: &mut ValidationErrors) -> Option<i32> {
    let Some(value) = value else {
        errors.add("count", "is required");
        return None;
    };
    let Some(n) = value.as_i64() else {
        errors.add("count", "must be an integer");
        return None;
    };
    if n < min {
        errors.add("count", format!("must be at least {min}"));
        return None;
    }
    match i32::try_from(n) {
        Ok(n) => Some(n),
        Err(_) => {
            errors.add("count", format!("must be at most {}", i32::MAX));
            None
        }
    }
}

fn required_string(
    object: &Map<String, Value>,
    parent: &str,
    field: &str,
    errors: &mut ValidationErrors,
) {
    let name = format!("{parent}.{field}");
    match object.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        Some(Value::String(_)) => errors.add(name, "must not be empty"),
        Some(_) => errors.add(name, "must be a string"),
        None => errors.add(name, "is required"),
    }
}

fn optional_string(
    value: Option<&Value>,
    name: &str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.add(name, "must be a string");
            None
        }
    }
}
