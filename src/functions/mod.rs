pub mod clock;
pub mod dashboard;
pub mod intake;

pub use clock::*;
pub use dashboard::*;
pub use intake::*;
