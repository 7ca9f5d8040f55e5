//! # rapid-bridge
//!
//! Turns computed 3-D waypoints into a RAPID motion program and runs it on a
//! physical or virtual robot controller.
//!
//! The crate has two halves:
//!
//! - **Generation** ([`target`], [`program`]): each waypoint becomes a
//!   [`Target`] with a canonical `robtarget` encoding, and a
//!   [`ProgramGenerator`] wraps them in a module of `CONST` declarations and
//!   `MoveL` statements plus a program descriptor.
//! - **Deployment** ([`session`], [`execution`]): a [`ControllerSession`]
//!   discovers a controller, logs on and takes write mastership as a
//!   [`MastershipGuard`]; the guard uploads and starts programs or patches a
//!   single target in place. The vendor transport stays behind the traits in
//!   [`controller`].
//!
//! Nothing here plans motion: targets are serialized as given.

pub mod controller;
pub mod error;
pub mod execution;
pub mod program;
pub mod session;
pub mod target;

pub use controller::*;
pub use error::{ControllerError, FormatError, TransportError};
pub use execution::*;
pub use program::*;
pub use session::*;
pub use target::*;
