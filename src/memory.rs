// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! Word-oriented access to target memory through the probe.

use std::io;
use std::time::Duration;

use log::{debug, trace};

use crate::error::{Error, ProtocolFault};
use crate::protocol::{Command, Response};
use crate::transport::Transport;

/// Size of the unit every memory access is made in.
pub const WORD_SIZE: usize = 4;

/// Large enough for any response the probe may send in a single bulk packet.
const RESPONSE_BUFFER_LENGTH: usize = 512;

/// An open command/response channel to the probe.
///
/// Every command sent through here is answered before the next one goes out, so an error
/// always names the exact word that failed.
pub struct ProbeLink<T>
where
	T: Transport,
{
	transport: T,
	timeout: Duration,
}

impl<T> ProbeLink<T>
where
	T: Transport,
{
	pub fn new(transport: T, timeout: Duration) -> Self
	{
		Self {
			transport,
			timeout,
		}
	}

	/// Consume the link and hand back the transport it was built on.
	pub fn into_inner(self) -> T
	{
		self.transport
	}

	/// Read `size` bytes of target memory starting at `address`.
	///
	/// `size` must be a positive multiple of [`WORD_SIZE`]. One read is issued per word in
	/// ascending address order and the result is only returned if every word succeeded.
	pub fn read_memory(&mut self, address: u32, size: usize) -> Result<Vec<u8>, Error>
	{
		check_transfer_size(size)?;
		word_address(address, size - WORD_SIZE)?;
		let mut result = Vec::with_capacity(size);
		for offset in (0..size).step_by(WORD_SIZE) {
			let response = self.transact(&Command::read(word_address(address, offset)?))?;
			result.extend_from_slice(&response.data());
		}
		Ok(result)
	}

	/// Read a single 32-bit word of target memory.
	pub fn read_word(&mut self, address: u32) -> Result<u32, Error>
	{
		Ok(self.transact(&Command::read(address))?.value)
	}

	/// Write a single 32-bit word of target memory.
	pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), Error>
	{
		self.transact(&Command::write_word(address, value))
			.map(|_| ())
	}

	/// Write `data` to target memory starting at `address`, one word per command.
	///
	/// The length of `data` must be a positive multiple of [`WORD_SIZE`]. Each word is
	/// acknowledged before the next is sent: on failure, the words before the failing address
	/// have been written and none after it have.
	pub fn write_memory(&mut self, address: u32, data: &[u8]) -> Result<(), Error>
	{
		check_transfer_size(data.len())?;
		word_address(address, data.len() - WORD_SIZE)?;
		for (index, chunk) in data.chunks_exact(WORD_SIZE).enumerate() {
			let chunk: [u8; WORD_SIZE] = [chunk[0], chunk[1], chunk[2], chunk[3]];
			let target = word_address(address, index * WORD_SIZE)?;
			self.transact(&Command::write_bytes(target, chunk))?;
		}
		Ok(())
	}

	/// Send a packet the probe does not answer.
	pub fn send_raw(&mut self, packet: &[u8]) -> Result<(), Error>
	{
		trace!("-> raw {:02x?}", packet);
		self.send(packet, 0)
	}

	/// Run one command/response exchange and check the probe accepted it.
	fn transact(&mut self, command: &Command) -> Result<Response, Error>
	{
		let address = command.address();
		trace!("-> {}", command);
		self.send(&command.encode(), address)?;

		let mut buffer = [0u8; RESPONSE_BUFFER_LENGTH];
		let length = self
			.transport
			.read(&mut buffer, self.timeout)
			.map_err(|e| self.transfer_error(e, "read the response", address))?;
		let response = Response::decode(&buffer[..length]).map_err(|e| Error::ProtocolError {
			address,
			fault: e.into(),
		})?;
		trace!("<- status {:#04x} value {:#010x}", response.status, response.value);

		if !response.is_success() {
			debug!("Probe rejected {} with status {:#04x}", command, response.status);
			return Err(Error::ProtocolError {
				address,
				fault: ProtocolFault::bad_status(response.status),
			});
		}
		Ok(response)
	}

	fn send(&mut self, packet: &[u8], address: u32) -> Result<(), Error>
	{
		let written = self
			.transport
			.write(packet, self.timeout)
			.map_err(|e| self.transfer_error(e, "send the command", address))?;
		if written != packet.len() {
			return Err(Error::ProtocolError {
				address,
				fault: ProtocolFault::ShortWrite {
					written,
					length: packet.len(),
				},
			});
		}
		Ok(())
	}

	fn transfer_error(&self, error: io::Error, operation: &'static str, address: u32) -> Error
	{
		match error.kind() {
			io::ErrorKind::TimedOut => Error::TransportTimeout {
				operation,
				address,
				timeout: self.timeout,
			},
			_ => Error::Usb {
				operation,
				source: error,
			},
		}
	}
}

/// Transfers are made of whole words, and there has to be at least one.
fn check_transfer_size(size: usize) -> Result<(), Error>
{
	if size == 0 || size % WORD_SIZE != 0 {
		return Err(Error::invalid_argument(format!(
			"transfer size {} is not a positive multiple of {}",
			size, WORD_SIZE
		)));
	}
	Ok(())
}

fn word_address(base: u32, offset: usize) -> Result<u32, Error>
{
	u32::try_from(offset)
		.ok()
		.and_then(|offset| base.checked_add(offset))
		.ok_or_else(|| {
			Error::invalid_argument(format!(
				"transfer from {:#010x} runs past the end of the address space",
				base
			))
		})
}
