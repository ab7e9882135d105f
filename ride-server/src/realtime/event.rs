//! Change notifications and the in-process bus that carries them.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 256;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// "Something in this table changed."
///
/// No diff is guaranteed. Consumers re-fetch; `record` is only used to
/// decide whether the change is relevant to them.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    /// New row for inserts/updates, old row for deletes, if sent
    pub record: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            table: table.into(),
            kind,
            record: None,
        }
    }

    pub fn with_record(mut self, record: serde_json::Value) -> Self {
        self.record = Some(record);
        self
    }
}

/// Fan-out of change events to every interested refresh loop.
///
/// Cheap to clone. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<Arc<ChangeEvent>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        tracing::trace!(table = %event.table, kind = ?event.kind, "change published");
        let _ = self.tx.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChangeEvent>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}
