mod as_value;
mod column;
mod connection;
mod database;
mod error;
mod expression;
mod param;
mod query;
mod row;
mod table;
mod transaction;
mod util;
mod value;
pub mod writer;

pub use ::anyhow::Context;
pub use as_value::*;
pub use column::*;
pub use connection::*;
pub use database::*;
pub use error::*;
pub use expression::*;
pub use param::*;
pub use query::*;
pub use row::*;
pub use table::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub use writer::{GenericSqlWriter, SqlWriter};

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
