// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::io;
use std::time::Duration;

use crate::config::ProbeConfig;
use crate::error::Error;

/// Types implementing this trait move raw packets between us and the probe's bulk endpoints.
///
/// The link is strictly half-duplex: the probe has a command queue depth of one, so callers
/// must read the response to a command before writing the next one. Timeouts must be reported
/// as [`io::ErrorKind::TimedOut`] so they can be told apart from other transfer failures.
pub trait Transport
{
	/// Write one command packet to the command-out endpoint, returning how many bytes were taken.
	fn write(&mut self, packet: &[u8], timeout: Duration) -> io::Result<usize>;

	/// Read one response packet from the response-in endpoint into `buffer`.
	fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> io::Result<usize>;

	/// Release the device. Must be harmless to call more than once.
	fn close(&mut self) {}
}

/// A [`Transport`] that knows how to find and open its own device.
pub trait OpenTransport: Transport + Sized
{
	fn open(config: &ProbeConfig) -> Result<Self, Error>;
}
