//! Recording visitor for testing.
//!
//! Provides a [`SchemaVisitor`] that captures every callback so tests can assert on
//! the traversal a schema walk performs, without writing a visitor per test.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::composite::Schema;
use crate::path::FieldPath;
use crate::walker::SchemaVisitor;

/// Captured callback information for verification.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedVisit {
    Enter { path: String, kind: &'static str },
    Leave { path: String },
    Value { path: String, value: Value },
}

/// Visitor that records all callbacks.
///
/// Clones share the same capture buffer, so a clone can be handed to the walker
/// while the original is kept for assertions.
#[derive(Clone, Default)]
pub struct RecordingVisitor {
    captured: Arc<RwLock<Vec<CapturedVisit>>>,
}

impl RecordingVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured visits.
    pub fn visits(&self) -> Vec<CapturedVisit> {
        self.captured.read().clone()
    }

    /// Get the number of callbacks received.
    pub fn visit_count(&self) -> usize {
        self.captured.read().len()
    }

    /// Paths that were entered, in order.
    pub fn entered_paths(&self) -> Vec<String> {
        self.captured
            .read()
            .iter()
            .filter_map(|visit| match visit {
                CapturedVisit::Enter { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Leaf values that were recorded, in order.
    pub fn values(&self) -> Vec<(String, Value)> {
        self.captured
            .read()
            .iter()
            .filter_map(|visit| match visit {
                CapturedVisit::Value { path, value } => Some((path.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Clear all captured visits.
    pub fn clear(&self) {
        self.captured.write().clear();
    }

    fn record(&self, visit: CapturedVisit) {
        self.captured.write().push(visit);
    }
}

impl SchemaVisitor for RecordingVisitor {
    fn enter_field(&mut self, path: &FieldPath, schema: &Schema) {
        self.record(CapturedVisit::Enter {
            path: path.to_string(),
            kind: schema.kind_name(),
        });
    }

    fn leave_field(&mut self, path: &FieldPath) {
        self.record(CapturedVisit::Leave {
            path: path.to_string(),
        });
    }

    fn record_value(&mut self, path: &FieldPath, value: &Value) {
        self.record(CapturedVisit::Value {
            path: path.to_string(),
            value: value.clone(),
        });
    }
}
