//! Test harness: document builders and rich assertions shared by the
//! end-to-end scenario suites.

pub mod assertions;
pub mod helpers;

pub use assertions::*;
pub use helpers::*;
