// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::time::Duration;

use crate::usb::{Pid, Vid};

pub mod breakpoints;
pub mod config;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod registers;
pub mod session;
pub mod transport;
pub mod usb;

pub use crate::config::ProbeConfig;
pub use crate::error::Error;
pub use crate::session::{LifecycleState, Session};

/// Sources of probe selection and link parameters (such as the command line) implement this
/// so a [`ProbeConfig`] can be built from them. `None` means "use the default".
pub trait InceptionParams
{
	fn vid(&self) -> Option<Vid>;
	fn pid(&self) -> Option<Pid>;
	fn serial_number(&self) -> Option<&str>;
	fn index(&self) -> Option<usize>;
	fn timeout(&self) -> Option<Duration>;
}
