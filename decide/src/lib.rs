#[macro_use]
extern crate serde;

mod authority;
mod ballot;
mod census;
mod envelope;
mod error;
mod identity;
mod serde_bigint;
mod service;
mod status;
mod store;
mod tally;
mod voting;

pub use authority::*;
pub use ballot::*;
pub use census::*;
pub use envelope::*;
pub use error::*;
pub use identity::*;
pub use serde_bigint::*;
pub use service::*;
pub use status::*;
pub use store::*;
pub use tally::*;
pub use voting::*;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;
