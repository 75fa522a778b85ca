//! Dense feature vector construction.
//!
//! Requests are sparse JSON maps. Building never fails: missing features
//! become zero and are reported, and values that cannot be read as numbers
//! become zero and are reported as coerced.

use crate::schema::ReconciledSchema;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Raw request features keyed by name.
pub type FeatureMap = HashMap<String, Value>;

/// A dense vector aligned with the resolved feature order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: Vec<f64>,
    /// Features absent from the request (or `null`).
    pub missing: Vec<String>,
    /// Features present but not numeric; written as zero.
    pub coerced: Vec<String>,
}

impl FeatureVector {
    /// Entries that carry nonzero evidence.
    pub fn nonzero_count(&self) -> usize {
        self.values.iter().filter(|v| **v != 0.0).count()
    }
}

/// Reads one JSON value as a feature. `None` means not coercible.
pub fn coerce_value(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Builds the dense vector for a request.
pub fn build_vector(features: &FeatureMap, schema: &ReconciledSchema) -> FeatureVector {
    let order = schema.order();
    let mut values = Vec::with_capacity(order.len());
    let mut missing = Vec::new();
    let mut coerced = Vec::new();

    for name in order {
        let supplied = features.get(name).filter(|v| !v.is_null());
        if schema.is_zero_filled(name) {
            // Always zero; reported as missing only when the request omits it.
            values.push(0.0);
            if supplied.is_none() {
                missing.push(name.clone());
            }
            continue;
        }
        match supplied {
            None => {
                values.push(0.0);
                missing.push(name.clone());
            }
            Some(value) => match coerce_value(value) {
                Some(v) => values.push(v),
                None => {
                    values.push(0.0);
                    coerced.push(name.clone());
                }
            },
        }
    }

    let ignored = features
        .keys()
        .filter(|k| !order.iter().any(|n| n == *k))
        .count();
    if ignored > 0 {
        debug!(ignored, "Ignored request keys outside the resolved feature order");
    }

    FeatureVector {
        values,
        missing,
        coerced,
    }
}
