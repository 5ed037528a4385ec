//! Editor module for the collaborative shop table.
//!
//! This module implements the client-side editing machinery:
//! - Explicit editor state owned by a single controller (no globals)
//! - Per-cell edit state machine with validation and REST fallback
//! - Pure projection of shops + locks into row view-models
//! - On-demand change-history viewing
//! - Transient toast notifications

pub mod controller;
pub mod history;
pub mod notify;
pub mod state;
pub mod table;

pub use controller::{CommitOutcome, EditController, EditError};
pub use history::{HistoryView, HistoryViewer};
pub use notify::{Notification, Notifier, NotifyLevel};
pub use state::{EditSession, EditorState};
pub use table::RowView;

use crate::api::ShopRecord;

/// Unit suffix rendered after wait-time values ("45分"); stripped for edit
/// prefill and re-added on render.
pub const WAIT_TIME_SUFFIX: &str = "分";

/// The columns a user may edit. The derived `updated_at`/`updated_by`
/// columns are excluded by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditableField {
    Name,
    Address,
    BusinessHours,
    ClosedDays,
    Seats,
    WaitTime,
}

impl EditableField {
    pub const ALL: [EditableField; 6] = [
        EditableField::Name,
        EditableField::Address,
        EditableField::BusinessHours,
        EditableField::ClosedDays,
        EditableField::Seats,
        EditableField::WaitTime,
    ];

    /// Wire/REST key for this field
    pub fn key(&self) -> &'static str {
        match self {
            EditableField::Name => "name",
            EditableField::Address => "address",
            EditableField::BusinessHours => "business_hours",
            EditableField::ClosedDays => "closed_days",
            EditableField::Seats => "seats",
            EditableField::WaitTime => "wait_time",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.key() == key)
    }

    /// Cell text as rendered in the table
    pub fn display(&self, shop: &ShopRecord) -> String {
        match self {
            EditableField::Name => shop.name.clone(),
            EditableField::Address => shop.address.clone(),
            EditableField::BusinessHours => shop.business_hours.clone(),
            EditableField::ClosedDays => shop.closed_days.clone(),
            EditableField::Seats => shop.seats.clone(),
            EditableField::WaitTime => format_wait_time(shop.wait_time),
        }
    }

    /// Text pre-filled into the edit input. The wait-time field drops its
    /// unit suffix so the user edits the bare number.
    pub fn prefill(&self, shop: &ShopRecord) -> String {
        match self {
            EditableField::WaitTime => shop
                .wait_time
                .map(|minutes| minutes.to_string())
                .unwrap_or_default(),
            _ => self.display(shop),
        }
    }
}

/// Render a wait time with its unit suffix, or empty when unposted
pub fn format_wait_time(wait_time: Option<u32>) -> String {
    wait_time
        .map(|minutes| format!("{}{}", minutes, WAIT_TIME_SUFFIX))
        .unwrap_or_default()
}
