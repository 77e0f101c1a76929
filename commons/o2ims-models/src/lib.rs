pub mod condition;
pub mod identity;
pub mod object;

#[cfg(feature = "crd")]
pub mod crd;

pub use condition::*;
pub use identity::*;
pub use object::*;
