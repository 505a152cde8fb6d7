//! Rotor Core
//!
//! Shared vocabulary for the credential rotation crates: token pairs,
//! rotation status snapshots, bindings and their rotation policy, the
//! injectable clock, and the error taxonomy every component converts into.
//! This crate has minimal dependencies and performs no I/O beyond loading
//! configuration files.

pub mod binding;
pub mod clock;
pub mod duration;
pub mod error;
pub mod rotation;
pub mod token;

pub use binding::{Binding, RotationPolicy};
pub use clock::{Clock, FixedClock, SharedClock, SystemClock, system_clock};
pub use error::{Error, Result};
pub use rotation::{RotationStatus, RotationStrategy};
pub use token::{ConnectionDetails, TokenSet};
