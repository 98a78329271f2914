use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::model::{Agent, Session};

use super::table::Table;

/// The published state of the database: one table per entity kind. Cloning
/// `State` clones both tables (an O(n) copy), which is the price paid for
/// representing transactions as plain owned values instead of a
/// copy-on-write persistent structure — acceptable at the scale this store
/// is built for, with no durability or cost-based scheduling to justify
/// the added complexity of a real persistent map.
#[derive(Clone, Debug, Default)]
struct State {
    agents: Table<Agent>,
    sessions: Table<Session>,
}

/// The in-memory transactional store. `begin_read` never blocks; at most
/// one `begin_write` transaction is live at a time, serialized on `writer`.
pub struct Database {
    published: RwLock<Arc<State>>,
    writer: Mutex<()>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        Self { published: RwLock::new(Arc::new(State::default())), writer: Mutex::new(()) }
    }

    /// Begin a read transaction observing a consistent snapshot as of now.
    /// Readers never block writers and are never blocked by them: this
    /// only takes the `RwLock` long enough to clone an `Arc`.
    pub fn begin_read(&self) -> ReadTxn {
        let snapshot = self.published.read().expect("database lock poisoned").clone();
        ReadTxn { snapshot }
    }

    /// Begin a write transaction. Blocks until any other live write
    /// transaction commits or aborts.
    pub fn begin_write(&self) -> WriteTxn<'_> {
        let guard = self.writer.lock().expect("writer lock poisoned");
        let working = (*self.published.read().expect("database lock poisoned")).clone();
        WriteTxn { _guard: guard, db: self, working }
    }
}

/// A snapshot-isolated read transaction.
pub struct ReadTxn {
    snapshot: Arc<State>,
}

impl ReadTxn {
    pub fn agents(&self) -> &Table<Agent> {
        &self.snapshot.agents
    }

    pub fn sessions(&self) -> &Table<Session> {
        &self.snapshot.sessions
    }
}

/// A read/write transaction. Mutations are only visible to other
/// transactions after [`WriteTxn::commit`]; dropping the transaction
/// without committing (or calling [`WriteTxn::abort`]) discards them.
pub struct WriteTxn<'a> {
    _guard: MutexGuard<'a, ()>,
    db: &'a Database,
    working: State,
}

impl<'a> WriteTxn<'a> {
    pub fn agents(&self) -> &Table<Agent> {
        &self.working.agents
    }

    pub fn agents_mut(&mut self) -> &mut Table<Agent> {
        &mut self.working.agents
    }

    pub fn sessions(&self) -> &Table<Session> {
        &self.working.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut Table<Session> {
        &mut self.working.sessions
    }

    /// Atomically publishes every write made through this transaction.
    pub fn commit(self) {
        *self.db.published.write().expect("database lock poisoned") = Arc::new(self.working);
    }

    /// Discards every write made through this transaction.
    pub fn abort(self) {}
}
