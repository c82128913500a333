use crate::{ConnectionHandle, Error, ErrorKind, Result};
use std::{cell::RefCell, collections::HashMap, fmt};
use uuid::Uuid;

/// How a transaction block relates to the one already active on the thread.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Join the active transaction, or start one when there is none.
    #[default]
    Required,
    /// Suspend the active transaction and start an independent one, resumed afterwards.
    RequiresNew,
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Propagation::Required => "REQUIRED",
            Propagation::RequiresNew => "REQUIRES_NEW",
        })
    }
}

struct Record {
    connection: Option<ConnectionHandle>,
    children: Vec<Uuid>,
    rollback_only: bool,
}

#[derive(Default)]
struct Registry {
    records: HashMap<Uuid, Record>,
    active: Option<Uuid>,
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

/// Id of the transaction active on this thread.
pub fn active_transaction() -> Option<Uuid> {
    REGISTRY.with_borrow(|r| r.active)
}

pub fn is_transaction_active() -> bool {
    active_transaction().is_some()
}

/// Connection pinned to the active transaction.
pub(crate) fn pinned_connection() -> Option<ConnectionHandle> {
    REGISTRY.with_borrow(|r| {
        r.active
            .and_then(|id| r.records.get(&id))
            .and_then(|record| record.connection.clone())
    })
}

fn disable_auto_commit(connection: &ConnectionHandle) -> Result<()> {
    connection.with(|c| {
        if c.auto_commit()? {
            c.set_auto_commit(false)?;
        }
        Ok(())
    })
}

/// Pin `connection` to the active transaction when it has none yet.
pub(crate) fn track_connection(connection: &ConnectionHandle) -> Result<()> {
    let pin = REGISTRY.with_borrow(|r| {
        r.active
            .and_then(|id| r.records.get(&id))
            .is_some_and(|record| record.connection.is_none())
    });
    if !pin {
        return Ok(());
    }
    disable_auto_commit(connection)?;
    REGISTRY.with_borrow_mut(|r| {
        if let Some(record) = r.active.and_then(|id| r.records.get_mut(&id)) {
            record.connection = Some(connection.clone());
        }
    });
    log::debug!("Pinned {:?} to transaction", connection);
    Ok(())
}

/// Run `op` inside a transaction.
///
/// Every query executed by `op` on this thread without an explicit connection shares
/// the connection of the transaction, the first query decides which one it is. When
/// the block owns the transaction, it commits if `op` succeeds and rolls back if it
/// fails. A `Required` block that joined an outer transaction leaves the outcome to
/// it, a failure makes the outer transaction roll back.
///
/// ```rust,no_run
/// use quarry_core::{Propagation, Query, Table, transaction};
/// # fn run(db: &quarry_core::Database) -> quarry_core::Result<()> {
/// let customer = Table::new("customer");
/// let name = customer.column::<String>("name");
/// transaction(Propagation::Required, || {
///     Query::<()>::new(|q| {
///         q.insert(&customer, |i| {
///             i.eq(&name, "Acme");
///         });
///     })
///     .execute(db)?;
///     Ok(())
/// })
/// # }
/// ```
pub fn transaction<R>(propagation: Propagation, op: impl FnOnce() -> Result<R>) -> Result<R> {
    run(None, propagation, op)
}

/// Same as [`transaction`] but the transaction uses `connection`, auto-commit is disabled on it.
pub fn transaction_with<R>(
    connection: ConnectionHandle,
    propagation: Propagation,
    op: impl FnOnce() -> Result<R>,
) -> Result<R> {
    run(Some(connection), propagation, op)
}

fn run<R>(
    connection: Option<ConnectionHandle>,
    propagation: Propagation,
    op: impl FnOnce() -> Result<R>,
) -> Result<R> {
    if let Some(connection) = &connection {
        disable_auto_commit(connection)?;
    }
    let id = Uuid::new_v4();
    let (previous, joined) = REGISTRY.with_borrow_mut(|r| {
        let previous = r.active;
        r.records.insert(
            id,
            Record {
                connection,
                children: Vec::new(),
                rollback_only: false,
            },
        );
        let joined = match (propagation, previous) {
            (Propagation::Required, Some(parent)) => {
                if let Some(parent) = r.records.get_mut(&parent) {
                    parent.children.push(id);
                }
                true
            }
            _ => {
                r.active = Some(id);
                false
            }
        };
        (previous, joined)
    });
    log::trace!(
        "Transaction {} started ({}{})",
        id,
        propagation,
        if joined { ", joined" } else { "" }
    );
    let scope = Scope {
        id,
        previous,
        joined,
        finished: false,
    };
    let result = op();
    scope.finish(result)
}

/// Restores the previously active transaction when the block exits, also while unwinding.
struct Scope {
    id: Uuid,
    previous: Option<Uuid>,
    joined: bool,
    finished: bool,
}

impl Scope {
    fn finish<R>(mut self, result: Result<R>) -> Result<R> {
        self.finished = true;
        if self.joined {
            if result.is_err() {
                self.mark_parent_rollback_only();
            }
            self.restore();
            return result;
        }
        let rollback_only = REGISTRY.with_borrow(|r| {
            r.records
                .get(&self.id)
                .is_some_and(|record| record.rollback_only)
        });
        let commit = result.is_ok() && !rollback_only;
        resolve(self.id, commit);
        self.restore();
        match result {
            Ok(..) if rollback_only => {
                let error = Error::new(ErrorKind::TransactionRolledBack(self.id));
                log::error!("{:#}", error);
                Err(error)
            }
            result => result,
        }
    }

    fn mark_parent_rollback_only(&self) {
        REGISTRY.with_borrow_mut(|r| {
            if let Some(parent) = self.previous.and_then(|id| r.records.get_mut(&id)) {
                parent.rollback_only = true;
            }
        });
        log::warn!(
            "Transaction {} failed, the enclosing transaction will roll back",
            self.id
        );
    }

    fn restore(&self) {
        REGISTRY.with_borrow_mut(|r| r.active = self.previous);
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log::error!("Transaction {} interrupted by a panic", self.id);
        if self.joined {
            self.mark_parent_rollback_only();
        } else {
            resolve(self.id, false);
        }
        self.restore();
    }
}

/// Commit or roll back the connections of the transaction and of its joined blocks,
/// children first, each connection once. The records are removed from the registry.
fn resolve(id: Uuid, commit: bool) {
    let connections = REGISTRY.with_borrow_mut(|r| {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(record) = r.records.remove(&current) {
                stack.extend(record.children.iter().copied());
                order.push(record.connection);
            }
        }
        let mut connections: Vec<ConnectionHandle> = Vec::new();
        for connection in order.into_iter().rev().flatten() {
            if !connections.iter().any(|v| v.same(&connection)) {
                connections.push(connection);
            }
        }
        connections
    });
    for connection in connections {
        settle(id, &connection, commit);
    }
}

fn settle(id: Uuid, connection: &ConnectionHandle, commit: bool) {
    let action = if commit { "committing" } else { "rolling back" };
    log::debug!("Transaction {}: {} {:?}", id, action, connection);
    let result = connection.with(|c| if commit { c.commit() } else { c.rollback() });
    if let Err(error) = result {
        let error = error.context(format!("While {} transaction {}", action, id));
        log::error!("{:#}", error);
    }
    if let Err(error) = connection.close() {
        let error = error.context(format!("While closing the connection of transaction {}", id));
        log::error!("{:#}", error);
    }
}
