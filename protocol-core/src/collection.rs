//! The multi-connection collection: a lock-free-style snapshot of every
//! live interpreter, with a four-signal wake discipline on every mutation.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::interpreter::Interpreter;
use crate::support::notify::NotificationSignal;
use crate::support::transactional::TransactionalContainer;

/// Opaque key identifying one connection's interpreter within the collection.
/// The host picks these (a socket fd, a slot index, anything unique and stable).
pub type ConnectionId = u64;

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("connection {0} already has a live interpreter")]
    AlreadyLive(ConnectionId),
}

/// An immutable snapshot of the connection set.
#[derive(Default)]
pub struct InterpreterCollection {
    interpreters: BTreeMap<ConnectionId, Arc<Interpreter>>,
}

impl InterpreterCollection {
    pub fn get(&self, id: ConnectionId) -> Option<&Arc<Interpreter>> {
        self.interpreters.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionId, &Arc<Interpreter>)> {
        self.interpreters.iter()
    }

    pub fn len(&self) -> usize {
        self.interpreters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interpreters.is_empty()
    }
}

/// Owns the published `InterpreterCollection` and fires all four wake
/// signals after any insert or remove, regardless of which one the mutation
/// most directly concerns — readers of each signal decide for themselves
/// whether there is work to do.
pub struct InterpreterCollectionManager {
    container: TransactionalContainer<InterpreterCollection>,
    pub wake_up_interpreter: Arc<NotificationSignal>,
    pub wake_up_for_output: Arc<NotificationSignal>,
    pub wake_up_for_input: Arc<NotificationSignal>,
    pub wake_up_for_callback: Arc<NotificationSignal>,
}

impl InterpreterCollectionManager {
    pub fn new() -> InterpreterCollectionManager {
        InterpreterCollectionManager {
            container: TransactionalContainer::new(InterpreterCollection::default()),
            wake_up_interpreter: Arc::new(NotificationSignal::new()),
            wake_up_for_output: Arc::new(NotificationSignal::new()),
            wake_up_for_input: Arc::new(NotificationSignal::new()),
            wake_up_for_callback: Arc::new(NotificationSignal::new()),
        }
    }

    pub fn snapshot(&self) -> Arc<InterpreterCollection> {
        self.container.load()
    }

    /// Inserts a new interpreter. Replaces an exited one at the same id;
    /// refuses to clobber a live one.
    pub fn insert(
        &self,
        id: ConnectionId,
        interpreter: Arc<Interpreter>,
    ) -> Result<(), CollectionError> {
        let mut error = None;
        self.container.update(|current| {
            if let Some(existing) = current.interpreters.get(&id) {
                if !existing.has_exited() {
                    error = Some(CollectionError::AlreadyLive(id));
                    return InterpreterCollection {
                        interpreters: current.interpreters.clone(),
                    };
                }
            }
            let mut next = current.interpreters.clone();
            next.insert(id, interpreter.clone());
            InterpreterCollection { interpreters: next }
        });
        if let Some(e) = error {
            return Err(e);
        }
        self.fire_all();
        Ok(())
    }

    pub fn remove(&self, id: ConnectionId) {
        self.container.update(|current| {
            let mut next = current.interpreters.clone();
            next.remove(&id);
            InterpreterCollection { interpreters: next }
        });
        self.fire_all();
    }

    fn fire_all(&self) {
        self.wake_up_interpreter.notify();
        self.wake_up_for_output.notify();
        self.wake_up_for_input.notify();
        self.wake_up_for_callback.notify();
    }
}

impl Default for InterpreterCollectionManager {
    fn default() -> Self {
        InterpreterCollectionManager::new()
    }
}
