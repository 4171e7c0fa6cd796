//! rf-core: shared foundation for reflowctl.
//!
//! Contains:
//! - units (uom SI types + constructors in oven-friendly units)
//! - numeric (Real + range checks + float helpers)
//! - timing (tick execution statistics)
//! - fan (fan speed vocabulary shared by profiles and the mixer)
//! - error (shared error types)

pub mod error;
pub mod fan;
pub mod numeric;
#[cfg(feature = "serde")]
pub mod serde_nan;
pub mod timing;
pub mod units;

pub use error::{CoreError, CoreResult};
pub use fan::FanSpeed;
pub use numeric::*;
pub use timing::TickTimer;
pub use units::*;
