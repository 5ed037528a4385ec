//! Editor state owned by the controller.
//!
//! One `EditorState` per editor instance, passed by reference into the
//! renderer. Nothing here is global; tests construct the state directly and
//! multiple independent editors can coexist in one process.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::api::ShopRecord;
use crate::sync::{LockTable, ShopId};

use super::EditableField;

/// How long a row stays visually flashed after a remote update
pub const FLASH_DURATION: Duration = Duration::from_millis(1200);

/// The single in-flight edit, at most one per client
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub shop_id: ShopId,
    pub field: EditableField,
    /// Cell text as displayed before the edit began, restored on cancel
    pub original: String,
}

/// All mutable state of one editor instance.
///
/// The shop cache is read-mostly: replaced wholesale on reload, patched in
/// place by inbound field updates and REST fallback responses. Rows are
/// never deleted client-side.
pub struct EditorState {
    shops: Vec<ShopRecord>,
    pub locks: LockTable,
    session: Option<EditSession>,
    flashes: HashMap<ShopId, Instant>,
}

impl EditorState {
    pub fn new(shops: Vec<ShopRecord>) -> Self {
        Self {
            shops,
            locks: LockTable::new(),
            session: None,
            flashes: HashMap::new(),
        }
    }

    pub fn shops(&self) -> &[ShopRecord] {
        &self.shops
    }

    pub fn shop(&self, shop_id: ShopId) -> Option<&ShopRecord> {
        self.shops.iter().find(|shop| shop.id == shop_id)
    }

    pub fn shop_mut(&mut self, shop_id: ShopId) -> Option<&mut ShopRecord> {
        self.shops.iter_mut().find(|shop| shop.id == shop_id)
    }

    /// Replace the whole cache (full reload)
    pub fn replace_shops(&mut self, shops: Vec<ShopRecord>) {
        self.shops = shops;
    }

    /// Replace a single record with the server's authoritative version
    /// (REST fallback response). Unknown ids are appended.
    pub fn replace_shop(&mut self, shop: ShopRecord) {
        match self.shops.iter_mut().find(|s| s.id == shop.id) {
            Some(slot) => *slot = shop,
            None => self.shops.push(shop),
        }
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub(crate) fn set_session(&mut self, session: EditSession) {
        self.session = Some(session);
    }

    pub(crate) fn take_session(&mut self) -> Option<EditSession> {
        self.session.take()
    }

    /// Mark a row as freshly updated by a remote edit
    pub fn flash(&mut self, shop_id: ShopId, now: Instant) {
        self.flashes.insert(shop_id, now);
    }

    /// Whether the row's flash highlight is still active
    pub fn is_flashing(&self, shop_id: ShopId, now: Instant) -> bool {
        self.flashes
            .get(&shop_id)
            .is_some_and(|started| now.duration_since(*started) < FLASH_DURATION)
    }

    /// Drop expired flash entries
    pub fn prune_flashes(&mut self, now: Instant) {
        self.flashes
            .retain(|_, started| now.duration_since(*started) < FLASH_DURATION);
    }
}
