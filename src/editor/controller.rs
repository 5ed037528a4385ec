//! Cell edit controller: the per-cell state machine.
//!
//! A cell is either idle or editing, and at most one cell edits at a time.
//! Entering edit mode requests the row lock over the channel; committing
//! sends `update_field` (or falls back to a REST PATCH when the channel is
//! down, bypassing locking); both commit and cancel release the lock.
//!
//! The controller also applies every inbound protocol event to the editor
//! state: lock bookkeeping, field updates with timestamp stamping and row
//! flashes, and error surfacing. The client never invents lock state; a
//! pending lock request is not reflected until the server confirms it.

use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError, ShopRecord};
use crate::sync::protocol::{ClientMessage, FieldChange, ServerMessage};
use crate::sync::{Connection, RowLock, ShopId, UserIdentity};

use super::history::HistoryViewer;
use super::notify::Notifier;
use super::state::{EditSession, EditorState};
use super::table::{render_rows, RowView};
use super::{EditableField, HistoryView};

/// Errors produced by the edit state machine
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("Another cell is already being edited")]
    EditInProgress,

    #[error("Row is locked by {holder}")]
    RowLocked { holder: String },

    #[error("Unknown shop: {0}")]
    UnknownShop(ShopId),

    #[error("No edit in progress")]
    NoActiveEdit,

    #[error("Wait time must be empty or a non-negative number of minutes")]
    InvalidWaitTime,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// How a commit was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// `update_field` sent over the channel; the server broadcast will
    /// apply the change to the local cache
    SentViaChannel,
    /// Channel was down; REST PATCH succeeded and the response record
    /// replaced the cached row
    AppliedViaRest,
    /// Channel was down and the REST PATCH failed; the edit was abandoned
    /// and an error toast posted
    Failed,
}

/// One editor instance: owns the state, the channel handle, the REST
/// client, and the notification queue.
pub struct EditController {
    state: EditorState,
    identity: UserIdentity,
    conn: Connection,
    api: ApiClient,
    notifier: Notifier,
    history: HistoryViewer,
}

impl EditController {
    pub fn new(
        shops: Vec<ShopRecord>,
        identity: UserIdentity,
        conn: Connection,
        api: ApiClient,
        notifier: Notifier,
    ) -> Self {
        Self {
            state: EditorState::new(shops),
            identity,
            conn,
            api,
            notifier,
            history: HistoryViewer::new(),
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Project the current state into table rows
    pub fn render(&self, filter: &str) -> Vec<RowView> {
        render_rows(&self.state, filter, &self.identity, Instant::now())
    }

    /// Enter edit mode on one cell. Returns the text to pre-fill into the
    /// input (wait time stripped of its unit suffix).
    ///
    /// Refused while another cell is mid-edit, and for rows locked by
    /// another user. A lock request goes out if the channel is up; the
    /// edit proceeds optimistically without waiting for the grant.
    pub fn begin_edit(&mut self, shop_id: ShopId, field: EditableField) -> Result<String, EditError> {
        if self.state.session().is_some() {
            return Err(EditError::EditInProgress);
        }

        let shop = self.state.shop(shop_id).ok_or(EditError::UnknownShop(shop_id))?;

        if let RowLock::OtherLocked(holder) = self.state.locks.classify(shop_id, &self.identity.user_id) {
            return Err(EditError::RowLocked {
                holder: holder.user_name,
            });
        }

        let prefill = field.prefill(shop);
        let original = field.display(shop);
        self.state.set_session(EditSession {
            shop_id,
            field,
            original,
        });

        if self.conn.is_connected() {
            self.conn.send(ClientMessage::LockRequest { shop_id });
        }

        Ok(prefill)
    }

    /// Commit the active edit with the given input.
    ///
    /// Validation failures keep the edit session open so the user can
    /// correct in place. Otherwise the session closes: over the channel
    /// when connected, else through the REST fallback (whose failure is
    /// toasted, not returned; the edit is simply abandoned).
    pub async fn commit(&mut self, input: &str) -> Result<CommitOutcome, EditError> {
        let session = self.state.session().cloned().ok_or(EditError::NoActiveEdit)?;

        // Invalid input re-prompts in place; the session stays open.
        let value = validate_input(session.field, input)?;

        let outcome = if self.conn.is_connected() {
            self.conn.send(ClientMessage::UpdateField {
                shop_id: session.shop_id,
                field: session.field.key().to_string(),
                value,
            });
            CommitOutcome::SentViaChannel
        } else {
            match self
                .api
                .patch_shop_field(session.shop_id, session.field.key(), &value)
                .await
            {
                Ok(shop) => {
                    self.state.replace_shop(shop);
                    CommitOutcome::AppliedViaRest
                }
                Err(e) => {
                    self.notifier.error(format!("Update failed: {}", e));
                    CommitOutcome::Failed
                }
            }
        };

        if self.conn.is_connected() {
            self.conn
                .send(ClientMessage::UnlockRequest { shop_id: session.shop_id });
        }
        self.state.take_session();

        Ok(outcome)
    }

    /// Cancel the active edit. Returns the cell's pre-edit text; no
    /// mutation of any kind reaches the server.
    pub fn cancel(&mut self) -> Result<String, EditError> {
        let session = self.state.take_session().ok_or(EditError::NoActiveEdit)?;

        if self.conn.is_connected() {
            self.conn
                .send(ClientMessage::UnlockRequest { shop_id: session.shop_id });
        }

        Ok(session.original)
    }

    /// Apply one inbound protocol event to the editor state.
    pub fn apply_server_event(&mut self, event: ServerMessage) {
        match event {
            ServerMessage::Connected => {
                self.notifier.info("Joined the shared editing session");
            }
            ServerMessage::LockAcquired(grant) => {
                debug!("Lock on shop {} held by {}", grant.shop_id, grant.user_name);
                self.state.locks.acquire(&grant);
            }
            ServerMessage::LockFailed(denial) => {
                self.state.locks.deny(&denial);

                // A denial for the row we are editing means we never had
                // the lock: force-cancel rather than leave a phantom edit.
                if self.state.session().map(|s| s.shop_id) == Some(denial.shop_id) {
                    self.state.take_session();
                    self.notifier.error(format!(
                        "Row is being edited by {}",
                        denial.locked_by_name
                    ));
                }
            }
            ServerMessage::LockReleased { shop_id } => {
                self.state.locks.release(shop_id);
            }
            ServerMessage::FieldUpdated(change) => {
                self.apply_field_change(change);
            }
            ServerMessage::Error { detail } => {
                self.notifier.error(detail);
            }
            ServerMessage::LockHeartbeat | ServerMessage::LockMissing | ServerMessage::UpdateRejected => {
                debug!("Advisory protocol event: {:?}", event);
            }
        }
    }

    fn apply_field_change(&mut self, change: FieldChange) {
        let Some(shop) = self.state.shop_mut(change.shop_id) else {
            debug!("Field update for unknown shop {}", change.shop_id);
            return;
        };

        if !apply_field_value(shop, &change.field, &change.value) {
            warn!("Dropping update for unknown field {:?}", change.field);
            return;
        }

        // Stamp a fresh update time unless the timestamp itself changed.
        if change.field != "updated_at" {
            shop.updated_at = Some(Utc::now().to_rfc3339());
        }
        if let Some(name) = change.updated_by_name {
            shop.updated_by = Some(name);
        }

        self.state.flash(change.shop_id, Instant::now());
    }

    /// Refresh the shop cache wholesale from the REST listing.
    pub async fn reload(&mut self) -> Result<usize, EditError> {
        let limit = self.api.config().page_limit;
        let shops = self.api.list_shops(limit, 0).await?;
        let count = shops.len();
        self.state.replace_shops(shops);
        Ok(count)
    }

    /// Periodic housekeeping: drop expired flash highlights.
    pub fn maintain(&mut self) {
        self.state.prune_flashes(Instant::now());
    }

    /// Open the change-history modal for the chosen shop. Fetch failure is
    /// toasted and the modal stays closed.
    pub async fn open_history(&mut self, shop_id: ShopId) -> Result<(), EditError> {
        match self.history.open(&self.api, shop_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.notifier.error(format!("Failed to load history: {}", e));
                Err(e.into())
            }
        }
    }

    pub fn close_history(&mut self) {
        self.history.close();
    }

    pub fn history_view(&self) -> Option<&HistoryView> {
        self.history.current()
    }
}

/// Validate the committed input for one field and produce the wire value.
///
/// Wait time: empty input clears the value (`null`), digits become a
/// non-negative integer, anything else is rejected. Text fields pass
/// through verbatim.
fn validate_input(field: EditableField, input: &str) -> Result<Value, EditError> {
    match field {
        EditableField::WaitTime => {
            let trimmed = input.trim();
            if trimmed.is_empty() {
                Ok(Value::Null)
            } else if trimmed.chars().all(|c| c.is_ascii_digit()) {
                trimmed
                    .parse::<u32>()
                    .map(Value::from)
                    .map_err(|_| EditError::InvalidWaitTime)
            } else {
                Err(EditError::InvalidWaitTime)
            }
        }
        _ => Ok(Value::String(input.to_string())),
    }
}

/// Apply one loosely-typed field value to a cached record. Returns false
/// for field names the record does not carry.
fn apply_field_value(shop: &mut ShopRecord, field: &str, value: &Value) -> bool {
    match field {
        "name" => shop.name = value_text(value),
        "address" => shop.address = value_text(value),
        "business_hours" => shop.business_hours = value_text(value),
        "closed_days" => shop.closed_days = value_text(value),
        "seats" => shop.seats = value_text(value),
        "wait_time" => shop.wait_time = wait_minutes(value),
        "updated_at" => shop.updated_at = value.as_str().map(str::to_string),
        "updated_by" => shop.updated_by = value.as_str().map(str::to_string),
        _ => return false,
    }
    true
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn wait_minutes(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value.as_str().and_then(|s| s.trim().parse().ok())
}
