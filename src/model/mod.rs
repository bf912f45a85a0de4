pub mod command;
pub mod config;
pub mod dependency;
pub mod task;

pub use command::*;
pub use config::*;
pub use dependency::*;
pub use task::*;
