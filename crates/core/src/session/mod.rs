//! Remote browser-session controller abstraction.
//!
//! A `SessionController` starts and stops the externally managed browser
//! profile that an automation run drives.

mod gpm;
mod types;

pub use gpm::GpmController;
pub use types::*;
