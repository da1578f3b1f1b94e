pub mod assessment;
pub mod case;
pub mod enums;

pub use assessment::*;
pub use case::*;
pub use enums::*;
