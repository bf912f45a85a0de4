pub mod check;
pub mod hierarchy;
pub mod rules;

pub use rules::TaskError;
