pub mod math;
pub mod paths;

pub use math::*;
pub use paths::*;
