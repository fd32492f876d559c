//! Generic Access Profile types used by pairing
//!
//! Device addresses and link roles.

pub mod constants;
pub mod types;

pub use constants::*;
pub use types::*;
