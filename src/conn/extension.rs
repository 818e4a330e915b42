use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use crate::wire::Extension;

/// Server-assigned facts about one extension, valid for one connection.
///
/// Resolved at most once per connection, on the first request that needs
/// the extension; immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionData {
    /// The major opcode carried by every request of this extension.
    pub major_opcode: u8,

    /// First event code the server allocated to this extension.
    pub first_event: u8,

    /// First error code the server allocated to this extension.
    pub first_error: u8,
}

/// Connection-scoped table of resolved extensions. Created with the
/// connection and torn down with it; nothing is shared across connections.
#[derive(Default)]
pub(crate) struct ExtensionRegistry {
    cells: Mutex<HashMap<&'static str, Arc<OnceCell<ExtensionData>>>>,
}

impl ExtensionRegistry {
    pub(crate) fn new() -> Self {
        ExtensionRegistry::default()
    }

    /// The resolve-once cell for `extension`, created on first touch. The
    /// cell is handed out so resolution (a server round trip) runs without
    /// the table lock held.
    pub(crate) fn cell(&self, extension: Extension) -> Arc<OnceCell<ExtensionData>> {
        let mut cells = self.cells.lock().unwrap();
        cells.entry(extension.name).or_default().clone()
    }

    /// The already-resolved data for `extension`, if any.
    pub(crate) fn get(&self, extension: Extension) -> Option<ExtensionData> {
        let cells = self.cells.lock().unwrap();
        cells.get(extension.name).and_then(|cell| cell.get().copied())
    }
}
