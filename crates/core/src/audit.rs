//! Audit event types and payload redaction.

// ---------------------------------------------------------------------------
// Event type constants
// ---------------------------------------------------------------------------

/// Known `event_type` values for `audit_events` rows.
pub mod event_types {
    pub const SESSION_CREATED: &str = "SESSION_CREATED";
    pub const POS_CONNECTED: &str = "POS_CONNECTED";
    pub const POS_DISCONNECTED: &str = "POS_DISCONNECTED";
    pub const POS_LOCATION_SET: &str = "POS_LOCATION_SET";
}

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// Key fragments whose values never reach the audit table.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "token",
    "secret",
    "password",
    "authorization",
    "signature",
];

/// Replace the value of any key containing a [`SENSITIVE_FIELDS`] fragment
/// with `"[REDACTED]"`, recursing into nested objects and arrays.
pub fn redact_sensitive_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, val)| {
                    let lower = key.to_lowercase();
                    let val = if SENSITIVE_FIELDS.iter().any(|f| lower.contains(f)) {
                        serde_json::Value::String("[REDACTED]".to_string())
                    } else {
                        redact_sensitive_fields(val)
                    };
                    (key.clone(), val)
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact_sensitive_fields).collect())
        }
        other => other.clone(),
    }
}
