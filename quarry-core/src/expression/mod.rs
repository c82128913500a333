mod clause;
mod comparison;
mod node;

pub use clause::*;
pub use comparison::*;
pub use node::*;
