// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! Encoding and decoding of the Inception command and response packets.
//!
//! Every command addresses exactly one 4-byte word of target memory. A command is a big-endian
//! opcode tag followed by the big-endian target address and, for writes, the 4 bytes to store.
//! Every response is a status word (whose first byte is the status code) followed by a
//! big-endian data word. Nothing in here performs any I/O.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// Status code the probe places in a response to signal the access succeeded.
pub const STATUS_SUCCESS: u8 = 2;

/// Length of a command header (opcode + address).
pub const COMMAND_HEADER_LENGTH: usize = 8;
/// Length of a write command (header + one data word).
pub const WRITE_COMMAND_LENGTH: usize = COMMAND_HEADER_LENGTH + 4;
/// Length of a response packet (status word + data word).
pub const RESPONSE_LENGTH: usize = 8;

/// The fixed command word that asks the probe to reset the target's debug port.
/// The probe does not acknowledge this one.
pub const RESET_COMMAND: [u8; 8] = [0x30, 0x00, 0x00, 0x00, 0x30, 0x00, 0x00, 0x00];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode
{
	Write = 0x1400_0001,
	Read = 0x2400_0001,
}

impl TryFrom<u32> for Opcode
{
	type Error = CodecError;

	fn try_from(value: u32) -> Result<Self, Self::Error>
	{
		match value {
			0x1400_0001 => Ok(Self::Write),
			0x2400_0001 => Ok(Self::Read),
			_ => Err(CodecError::UnknownOpcode(value)),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CodecError
{
	#[error("packet is {length} bytes long but at least {expected} are required")]
	TooShort
	{
		length: usize,
		expected: usize,
	},

	#[error("unknown command opcode {0:#010x}")]
	UnknownOpcode(u32),
}

/// A single word access request to the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command
{
	Read
	{
		address: u32,
	},
	Write
	{
		address: u32,
		/// The bytes to place at `address`, in wire order.
		data: [u8; 4],
	},
}

impl Command
{
	pub fn read(address: u32) -> Self
	{
		Self::Read {
			address,
		}
	}

	/// Builds a write of a whole 32-bit value, which goes over the wire big-endian.
	pub fn write_word(address: u32, value: u32) -> Self
	{
		Self::write_bytes(address, value.to_be_bytes())
	}

	/// Builds a write of one chunk of a larger buffer, copied onto the wire as-is.
	pub fn write_bytes(address: u32, data: [u8; 4]) -> Self
	{
		Self::Write {
			address,
			data,
		}
	}

	pub fn opcode(&self) -> Opcode
	{
		match self {
			Self::Read { .. } => Opcode::Read,
			Self::Write { .. } => Opcode::Write,
		}
	}

	pub fn address(&self) -> u32
	{
		match *self {
			Self::Read { address } | Self::Write { address, .. } => address,
		}
	}

	pub fn encode(&self) -> Vec<u8>
	{
		let mut packet = Vec::with_capacity(WRITE_COMMAND_LENGTH);
		packet.extend_from_slice(&(self.opcode() as u32).to_be_bytes());
		packet.extend_from_slice(&self.address().to_be_bytes());
		if let Self::Write { data, .. } = self {
			packet.extend_from_slice(data);
		}
		packet
	}

	pub fn decode(packet: &[u8]) -> Result<Self, CodecError>
	{
		if packet.len() < COMMAND_HEADER_LENGTH {
			return Err(CodecError::TooShort {
				length: packet.len(),
				expected: COMMAND_HEADER_LENGTH,
			});
		}

		let opcode = Opcode::try_from(be_word(&packet[0..4]))?;
		let address = be_word(&packet[4..8]);
		match opcode {
			Opcode::Read => Ok(Self::read(address)),
			Opcode::Write => {
				let data: [u8; 4] = packet
					.get(8..WRITE_COMMAND_LENGTH)
					.and_then(|data| data.try_into().ok())
					.ok_or(CodecError::TooShort {
						length: packet.len(),
						expected: WRITE_COMMAND_LENGTH,
					})?;
				Ok(Self::write_bytes(address, data))
			},
		}
	}
}

impl Display for Command
{
	fn fmt(&self, f: &mut Formatter) -> fmt::Result
	{
		match self {
			Self::Read { address } => write!(f, "READ  {:#010x}", address),
			Self::Write { address, data } => write!(f, "WRITE {:#010x} <- {:02x?}", address, data),
		}
	}
}

/// The probe's answer to a single [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Response
{
	pub status: u8,
	pub value: u32,
}

impl Response
{
	pub fn success(value: u32) -> Self
	{
		Self {
			status: STATUS_SUCCESS,
			value,
		}
	}

	pub fn is_success(&self) -> bool
	{
		self.status == STATUS_SUCCESS
	}

	/// The data word as the bytes that were on the wire.
	pub fn data(&self) -> [u8; 4]
	{
		self.value.to_be_bytes()
	}

	pub fn encode(&self) -> [u8; RESPONSE_LENGTH]
	{
		let mut packet = [0; RESPONSE_LENGTH];
		packet[0] = self.status;
		packet[4..].copy_from_slice(&self.value.to_be_bytes());
		packet
	}

	/// Decodes a response, ignoring anything the probe sent past the data word.
	pub fn decode(packet: &[u8]) -> Result<Self, CodecError>
	{
		if packet.len() < RESPONSE_LENGTH {
			return Err(CodecError::TooShort {
				length: packet.len(),
				expected: RESPONSE_LENGTH,
			});
		}

		Ok(Self {
			status: packet[0],
			value: be_word(&packet[4..8]),
		})
	}
}

fn be_word(bytes: &[u8]) -> u32
{
	u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
