// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! Module for error handling code.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{CodecError, STATUS_SUCCESS};
use crate::session::LifecycleState;
use crate::usb::{Pid, Vid};

#[derive(Debug, Error)]
pub enum Error
{
	#[error("No Inception probe matching {vid}:{pid} was found! Check connection?")]
	ConnectionRefused
	{
		vid: Vid,
		pid: Pid,
		/// Present when enumerating or opening the device failed, rather than simply not finding it.
		#[source]
		source: Option<io::Error>,
	},

	#[error("Inception probe is connected but has no endpoint {endpoint:#04x}")]
	ConfigurationError
	{
		endpoint: u8,
	},

	#[error("Timed out after {timeout:?} waiting to {operation} at {address:#010x}")]
	TransportTimeout
	{
		/// What we were trying to do (e.g.: `"read the response"`).
		operation: &'static str,
		address: u32,
		timeout: Duration,
	},

	#[error("Probe failed the access at {address:#010x}: {fault}")]
	ProtocolError
	{
		address: u32,
		fault: ProtocolFault,
	},

	#[error("All {limit} hardware breakpoint comparators are in use")]
	ResourceExhausted
	{
		limit: usize,
	},

	#[error("Invalid argument: {reason}")]
	InvalidArgument
	{
		reason: String,
	},

	#[error("Cannot {operation} while the session is {state}")]
	InvalidState
	{
		operation: &'static str,
		state: LifecycleState,
	},

	#[error("USB transfer failed when attempting to {operation}")]
	Usb
	{
		operation: &'static str,
		#[source]
		source: io::Error,
	},
}

/// The ways in which a single command/response exchange can go wrong at the protocol level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolFault
{
	#[error("expected status {expected:#04x}, observed {observed:#04x}")]
	BadStatus
	{
		expected: u8,
		observed: u8,
	},

	#[error("only {written} of {length} command bytes were accepted")]
	ShortWrite
	{
		written: usize,
		length: usize,
	},

	#[error("malformed response ({0})")]
	Malformed(#[from] CodecError),
}

impl ProtocolFault
{
	pub fn bad_status(observed: u8) -> Self
	{
		Self::BadStatus {
			expected: STATUS_SUCCESS,
			observed,
		}
	}
}

impl Error
{
	pub(crate) fn invalid_argument<S>(reason: S) -> Self
	where
		S: Into<String>,
	{
		Self::InvalidArgument {
			reason: reason.into(),
		}
	}
}

#[macro_export]
macro_rules! log_and_return
{
	($err:expr) => {
		let err = $err;
		log::error!("{}", err);
		return Err(err);
	};
}
