pub mod byte_order;
pub mod error;
pub mod kind;

pub use byte_order::*;
pub use error::*;
pub use kind::*;
