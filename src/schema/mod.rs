pub mod schedule;
pub mod task;

pub use schedule::*;
pub use task::*;
