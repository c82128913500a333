//! Compose SQL as a tree of typed expressions and run it.
//!
//! A [`Query`] is built through nested closures, each receiving the [`Clause`] of the
//! node being built, so the shape of the code follows the shape of the statement.
//! Rendering walks the tree once and produces the SQL text together with the
//! parameters in placeholder order. Connections come from a [`Database`] and are
//! pinned to the active [`transaction`] of the thread, if any.
//!
//! ```rust
//! use quarry::{Query, Table};
//! let customer = Table::new("customer");
//! let id = customer.column::<i64>("id");
//! let name = customer.column::<String>("name");
//! let query = Query::<String>::new(|q| {
//!     q.select(&name);
//!     q.from(&customer);
//!     q.filter(|w| {
//!         w.gte(&id, 10);
//!         w.and(|and| {
//!             and.like(&name, "A%");
//!         });
//!     });
//! });
//! assert_eq!(
//!     query.render().unwrap(),
//!     "SELECT name \nFROM customer \nWHERE id >= ? AND name LIKE ?",
//! );
//! ```
pub use quarry_core::*;
