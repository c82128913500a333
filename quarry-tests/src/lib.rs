mod customer;
mod join;
mod lazy;
pub mod mock;
mod simple;
mod transaction1;
mod values;

pub use crate::customer::{Customer, Customers};
use crate::{join::join, lazy::lazy, simple::simple, values::values};
#[cfg(not(feature = "disable-transactions"))]
use crate::transaction1::transaction1;
use log::LevelFilter;
use quarry::Database;
use std::env;
pub use values::Money;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run every scenario against the database.
pub fn execute_tests(db: &Database) {
    simple(db);
    join(db);
    values(db);
    lazy(db);
    #[cfg(not(feature = "disable-transactions"))]
    transaction1(db);
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
