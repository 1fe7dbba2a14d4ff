//! In-memory container for the wizard's form state.

use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{AttachedDocument, DocumentSlot, DraftRecord, FieldValue, FormField, FormState, Step};

/// What changed in a [`FormStateStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormChangeKind {
    Field(FormField),
    Document(DocumentSlot),
    Step(Step),
    /// The whole state was replaced by a restored draft or reset.
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormChange {
    pub revision: u64,
    pub kind: FormChangeKind,
}

impl FormChange {
    /// Whether the change came from the user editing, as opposed to a restore.
    pub fn is_edit(&self) -> bool {
        !matches!(self.kind, FormChangeKind::Replaced)
    }
}

/// Holds the field values and current step of one wizard session.
///
/// Writes are never validated. Once [`lock`](Self::lock)ed, after a
/// submission, every write is ignored. Subscribers receive a [`FormChange`]
/// for each applied write.
///
/// # Examples
///
/// ```
/// use admitsync::application::FormStateStore;
/// use admitsync::domain::{FieldValue, FormField};
///
/// let mut store = FormStateStore::new();
/// let changes = store.subscribe();
/// store.set(FormField::FirstName, FieldValue::Text("Noor".into()));
/// store.set_step(9);
///
/// assert_eq!(store.get().text(FormField::FirstName), "Noor");
/// assert_eq!(store.step().get(), 6);
/// assert_eq!(changes.try_iter().count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct FormStateStore {
    state: FormState,
    step: Step,
    revision: u64,
    locked: bool,
    subscribers: Vec<Sender<FormChange>>,
}

impl FormStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<FormChange> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn get(&self) -> &FormState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns `false` when the write was dropped because the store is locked.
    pub fn set(&mut self, field: FormField, value: FieldValue) -> bool {
        if self.reject_write() {
            return false;
        }
        self.state.set(field, value);
        self.publish(FormChangeKind::Field(field));
        true
    }

    pub fn clear_field(&mut self, field: FormField) -> bool {
        if self.reject_write() {
            return false;
        }
        self.state.clear(field);
        self.publish(FormChangeKind::Field(field));
        true
    }

    pub fn attach(&mut self, slot: DocumentSlot, document: AttachedDocument) -> bool {
        if self.reject_write() {
            return false;
        }
        self.state.attach(slot, document);
        self.publish(FormChangeKind::Document(slot));
        true
    }

    pub fn detach(&mut self, slot: DocumentSlot) -> bool {
        if self.reject_write() {
            return false;
        }
        self.state.detach(slot);
        self.publish(FormChangeKind::Document(slot));
        true
    }

    /// Moves to step `n`, clamped into `[1, 6]`.
    pub fn set_step(&mut self, n: i64) -> bool {
        if self.reject_write() {
            return false;
        }
        self.step = Step::clamped(n);
        self.publish(FormChangeKind::Step(self.step));
        true
    }

    /// Replaces the whole state with a restored draft. The stored step is
    /// already normalized by [`Step`]'s deserializer.
    pub fn restore(&mut self, draft: DraftRecord) {
        if self.reject_write() {
            return;
        }
        self.state = draft.form_data;
        self.step = draft.current_step;
        self.publish(FormChangeKind::Replaced);
    }

    pub fn reset(&mut self) {
        if self.reject_write() {
            return;
        }
        self.state = FormState::default();
        self.step = Step::FIRST;
        self.publish(FormChangeKind::Replaced);
    }

    /// Freezes the store; used once the application has been submitted.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn snapshot(&self, saved_at: DateTime<Utc>) -> DraftRecord {
        DraftRecord::new(self.state.clone(), self.step, saved_at)
    }

    fn reject_write(&self) -> bool {
        if self.locked {
            debug!("ignoring form write after submission");
        }
        self.locked
    }

    fn publish(&mut self, kind: FormChangeKind) {
        self.revision += 1;
        let change = FormChange {
            revision: self.revision,
            kind,
        };
        // Drop subscribers whose receiving end has gone away.
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}
