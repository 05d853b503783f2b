// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::time::Duration;

use crate::InceptionParams;
use crate::usb::{InceptionVidPid, Pid, Vid};

/// How long any single USB transfer may take before it's reported as timed out.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything needed to find a probe and talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig
{
	vid: Vid,
	pid: Pid,
	serial: Option<String>,
	index: Option<usize>,
	timeout: Duration,
}

impl Default for ProbeConfig
{
	fn default() -> Self
	{
		Self {
			vid: InceptionVidPid::VID,
			pid: InceptionVidPid::PID,
			serial: None,
			index: None,
			timeout: DEFAULT_TIMEOUT,
		}
	}
}

impl ProbeConfig
{
	pub fn new() -> Self
	{
		Default::default()
	}

	/// Build a configuration from some parameter source, keeping the defaults for anything
	/// the source leaves unspecified.
	pub fn from_params<Params>(params: &Params) -> Self
	where
		Params: InceptionParams,
	{
		let defaults = Self::new();
		Self::new()
			.vid(params.vid().unwrap_or(defaults.vid))
			.pid(params.pid().unwrap_or(defaults.pid))
			.serial(params.serial_number())
			.index(params.index())
			.timeout(params.timeout().unwrap_or(defaults.timeout))
	}

	/// Set the USB vendor ID to look for.
	#[must_use]
	pub fn vid(mut self, vid: Vid) -> Self
	{
		self.vid = vid;
		self
	}

	/// Set the USB product ID to look for.
	#[must_use]
	pub fn pid(mut self, pid: Pid) -> Self
	{
		self.pid = pid;
		self
	}

	/// Set the serial number to match against.
	#[must_use]
	pub fn serial<'s, IntoOptStrT>(mut self, serial: IntoOptStrT) -> Self
	where
		IntoOptStrT: Into<Option<&'s str>>,
	{
		self.serial = serial.into().map(|s| s.to_string());
		self
	}

	/// Set the index (among matching devices) to use.
	#[must_use]
	pub fn index(mut self, idx: Option<usize>) -> Self
	{
		self.index = idx;
		self
	}

	/// Set the per-transfer timeout.
	#[must_use]
	pub fn timeout(mut self, timeout: Duration) -> Self
	{
		self.timeout = timeout;
		self
	}

	pub fn get_vid(&self) -> Vid
	{
		self.vid
	}

	pub fn get_pid(&self) -> Pid
	{
		self.pid
	}

	/// Get any serial number previously set with `.serial()`.
	pub fn get_serial(&self) -> Option<&str>
	{
		self.serial.as_deref()
	}

	/// Get any index previously set with `.index()`.
	pub fn get_index(&self) -> Option<usize>
	{
		self.index
	}

	pub fn get_timeout(&self) -> Duration
	{
		self.timeout
	}
}
