mod hub;
pub use hub::*;
