//! Warn-once diagnostics
//!
//! Missing source columns and unmapped fields are reported once per field
//! name for the lifetime of the process, however many compilations hit them.

use std::collections::HashSet;
use std::sync::Mutex;

use lazy_static::lazy_static;
use log::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A required source column is absent; the field is rendered as NULL
    MissingRequirement,
    /// A field has no known derivation
    UnknownField,
    /// A bare map container was requested; it is assembled key by key
    MapContainer,
}

lazy_static! {
    static ref REPORTED: Mutex<HashSet<(DiagnosticKind, String)>> = Mutex::new(HashSet::new());
}

/// Log `message` unless this (kind, field) was already reported. Returns true when logged.
pub fn report_once<F>(kind: DiagnosticKind, field: &str, message: F) -> bool
where
    F: FnOnce() -> String,
{
    let first_time = REPORTED
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert((kind, field.to_string()));

    if first_time {
        match kind {
            DiagnosticKind::MissingRequirement => warn!("{}", message()),
            DiagnosticKind::UnknownField => error!("{}", message()),
            DiagnosticKind::MapContainer => debug!("{}", message()),
        }
    }
    first_time
}

pub fn was_reported(kind: DiagnosticKind, field: &str) -> bool {
    REPORTED
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .contains(&(kind, field.to_string()))
}
