// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

#![allow(dead_code)]

use std::cell::{RefCell, RefMut};
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::rc::Rc;
use std::time::Duration;

use inception::protocol::{Command, RESET_COMMAND, Response};
use inception::registers::{DCRDR, DCRSR, DCRSR_REGWNR, DHCSR, Dhcsr, FP_CTRL, FpCtrl};
use inception::transport::Transport;

/// Everything the simulated probe has seen and will answer with.
#[derive(Default)]
pub struct ProbeState
{
	/// Target memory, one entry per word address, bytes in wire order.
	pub memory: BTreeMap<u32, [u8; 4]>,
	/// The core register file behind DCRSR/DCRDR.
	pub registers: [u32; 32],
	/// Every command received, in order.
	pub commands: Vec<Command>,
	/// How many times the unacknowledged reset word was received.
	pub resets: usize,
	/// Respond to accesses of this address with `fail_status`.
	pub fail_at: Option<u32>,
	pub fail_status: u8,
	/// Only answer this many commands, counted from the first one received.
	pub drop_after: Option<usize>,
	/// Answer with a truncated packet.
	pub truncate: bool,
	pub closed: usize,
	pending: VecDeque<Vec<u8>>,
}

impl ProbeState
{
	pub fn word(&self, address: u32) -> u32
	{
		u32::from_be_bytes(self.memory.get(&address).copied().unwrap_or_default())
	}

	pub fn set_word(&mut self, address: u32, value: u32)
	{
		self.memory.insert(address, value.to_be_bytes());
	}

	/// Commands that wrote to `address`, with the values written.
	pub fn writes_to(&self, address: u32) -> Vec<u32>
	{
		self.commands
			.iter()
			.filter_map(|command| match command {
				Command::Write { address: target, data } if *target == address => Some(u32::from_be_bytes(*data)),
				_ => None,
			})
			.collect()
	}

	pub fn write_addresses(&self) -> Vec<u32>
	{
		self.commands
			.iter()
			.filter(|command| matches!(command, Command::Write { .. }))
			.map(Command::address)
			.collect()
	}

	pub fn read_addresses(&self) -> Vec<u32>
	{
		self.commands
			.iter()
			.filter(|command| matches!(command, Command::Read { .. }))
			.map(Command::address)
			.collect()
	}

	fn execute(&mut self, command: Command) -> Response
	{
		let address = command.address();
		if self.fail_at == Some(address) {
			return Response {
				status: self.fail_status,
				value: 0,
			};
		}

		match command {
			Command::Read { .. } => Response::success(self.word(address)),
			Command::Write { data, .. } => {
				let value = u32::from_be_bytes(data);
				match address {
					DCRSR => {
						let selector = (value & 0x1f) as usize;
						if value & DCRSR_REGWNR != 0 {
							self.registers[selector] = self.word(DCRDR);
						} else {
							let register = self.registers[selector];
							self.set_word(DCRDR, register);
						}
						self.set_word(DCRSR, value);
					},
					DHCSR => {
						// Only writes carrying the key take effect, and the key never reads back
						if value & 0xffff_0000 == Dhcsr::KEY {
							let halted = value & (Dhcsr::C_HALT | Dhcsr::C_STEP) != 0;
							let status = if halted { Dhcsr::S_HALT } else { 0 };
							self.set_word(DHCSR, (value & 0xffff) | status | Dhcsr::S_REGRDY);
						}
					},
					FP_CTRL => {
						// The comparator count is read-only
						let current = self.word(FP_CTRL);
						if value & FpCtrl::KEY != 0 {
							self.set_word(FP_CTRL, (current & !FpCtrl::ENABLE) | (value & FpCtrl::ENABLE));
						}
					},
					_ => {
						self.memory.insert(address, data);
					},
				}
				Response::success(0)
			},
		}
	}
}

/// A probe living entirely in memory. Clones share the same state, so a test can keep one to
/// inspect while the session owns the other.
#[derive(Clone, Default)]
pub struct SimulatedProbe
{
	state: Rc<RefCell<ProbeState>>,
}

impl SimulatedProbe
{
	pub fn new() -> Self
	{
		Default::default()
	}

	/// A probe whose target reports `comparators` FlashPatch comparators.
	pub fn with_comparators(comparators: u32) -> Self
	{
		let probe = Self::new();
		probe.state().set_word(FP_CTRL, comparators << 8);
		probe
	}

	pub fn state(&self) -> RefMut<'_, ProbeState>
	{
		self.state.borrow_mut()
	}
}

impl Transport for SimulatedProbe
{
	fn write(&mut self, packet: &[u8], _timeout: Duration) -> io::Result<usize>
	{
		let mut state = self.state();
		if packet == RESET_COMMAND {
			state.resets += 1;
			return Ok(packet.len());
		}

		let command = Command::decode(packet).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
		state.commands.push(command);
		let sequence = state.commands.len();

		let response = state.execute(command);
		if state.drop_after.is_none_or(|limit| sequence <= limit) {
			let mut reply = response.encode().to_vec();
			if state.truncate {
				reply.truncate(5);
			}
			state.pending.push_back(reply);
		}
		Ok(packet.len())
	}

	fn read(&mut self, buffer: &mut [u8], _timeout: Duration) -> io::Result<usize>
	{
		match self.state().pending.pop_front() {
			Some(packet) => {
				buffer[..packet.len()].copy_from_slice(&packet);
				Ok(packet.len())
			},
			None => Err(io::ErrorKind::TimedOut.into()),
		}
	}

	fn close(&mut self)
	{
		self.state().closed += 1;
	}
}
