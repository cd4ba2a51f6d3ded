//! Webhook payload model and request-body normalization.
//!
//! Payloads are provider-defined, arbitrarily nested JSON. We keep them as a
//! schema-less [`serde_json::Value`] and derive every interesting field with
//! safe, default-returning path lookups; nothing is cached alongside the
//! payload that could drift from it.
//!
//! # Normalization
//!
//! A request body carries either a single event or a batch:
//!
//! - `{"_json": [envelope, ...]}` yields each envelope's inner payload
//! - `{"webhook": payload}` yields the inner payload
//! - anything else yields the body itself as the sole event
//!
//! Normalization never fails on shape: unknown or absent fields simply
//! produce absent derived values downstream.

use serde_json::Value;

use crate::{BATCH_WRAPPER_KEY, ENVELOPE_KEY};

/// Placeholder for absent resource/action/application fields.
const UNKNOWN: &str = "<unknown>";

/// A single webhook event payload.
///
/// Immutable once created; all accessors are pure functions of the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookPayload(Value);

impl WebhookPayload {
    /// Wrap a raw JSON payload.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the raw payload.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume the wrapper, returning the raw payload.
    pub fn into_inner(self) -> Value {
        self.0
    }

    /// String value at a nested path, if present.
    fn str_at(&self, path: &[&str]) -> Option<&str> {
        let mut node = &self.0;
        for key in path {
            node = node.get(key)?;
        }
        node.as_str()
    }

    /// The resource the platform event refers to (e.g. `release`).
    pub fn resource(&self) -> &str {
        self.str_at(&["resource"]).unwrap_or(UNKNOWN)
    }

    /// The action taken on the resource (e.g. `create`).
    pub fn action(&self) -> &str {
        self.str_at(&["action"]).unwrap_or(UNKNOWN)
    }

    /// Name of the application the platform event belongs to.
    pub fn application(&self) -> &str {
        self.str_at(&["data", "app", "name"]).unwrap_or(UNKNOWN)
    }

    /// The actor object attached to the event, or an empty object.
    pub fn actor(&self) -> Value {
        match self.0.get("actor") {
            Some(actor) if actor.is_object() => actor.clone(),
            _ => Value::Object(Default::default()),
        }
    }

    /// Event name of the form `app.<resource>.<action>`.
    pub fn event_name(&self) -> String {
        format!("app.{}.{}", self.resource(), self.action())
    }

    /// Event name in the past tense, used for log aggregation.
    pub fn event_name_past_tense(&self) -> String {
        format!("{}d", self.event_name())
    }

    /// Campaign name from `context.campaign.name`, empty when absent.
    pub fn utm_campaign(&self) -> &str {
        self.campaign_attribute("name")
    }

    /// Campaign medium, empty when absent.
    pub fn utm_medium(&self) -> &str {
        self.campaign_attribute("medium")
    }

    /// Campaign source, empty when absent.
    pub fn utm_source(&self) -> &str {
        self.campaign_attribute("source")
    }

    /// Campaign term, empty when absent.
    pub fn utm_term(&self) -> &str {
        self.campaign_attribute("term")
    }

    /// Campaign content, empty when absent.
    pub fn utm_content(&self) -> &str {
        self.campaign_attribute("content")
    }

    fn campaign_attribute(&self, key: &str) -> &str {
        self.str_at(&["context", "campaign", key]).unwrap_or("")
    }

    /// Raw user identifier, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.str_at(&["userId"])
    }

    /// Raw anonymous identifier, if any.
    pub fn anonymous_id(&self) -> Option<&str> {
        self.str_at(&["anonymousId"])
    }
}

/// Normalize a decoded request body into an ordered sequence of event
/// payloads.
pub fn normalize(body: Value) -> Vec<WebhookPayload> {
    if let Some(batch) = body.get(BATCH_WRAPPER_KEY).and_then(Value::as_array) {
        return batch.iter().cloned().map(unwrap_envelope).collect();
    }
    vec![unwrap_envelope(body)]
}

/// Extract the inner payload from a webhook envelope, falling back to the
/// envelope itself when the wrapper key is absent.
fn unwrap_envelope(mut envelope: Value) -> WebhookPayload {
    if let Some(map) = envelope.as_object_mut() {
        if let Some(inner) = map.remove(ENVELOPE_KEY) {
            return WebhookPayload::new(inner);
        }
    }
    WebhookPayload::new(envelope)
}
