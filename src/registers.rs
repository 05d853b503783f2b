// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! The target's memory-mapped debug registers, and access to the core register file through them.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use log::trace;

use crate::error::Error;
use crate::memory::ProbeLink;
use crate::transport::Transport;

/// FlashPatch Control Register.
pub const FP_CTRL: u32 = 0xE000_2000;
/// First FlashPatch comparator, comparator `n` lives at `FP_COMP_BASE + 4 * n`.
pub const FP_COMP_BASE: u32 = 0xE000_2008;
/// Debug Halting Control and Status Register.
pub const DHCSR: u32 = 0xE000_EDF0;
/// Debug Core Register Selector Register.
pub const DCRSR: u32 = 0xE000_EDF4;
/// Debug Core Register Data Register.
pub const DCRDR: u32 = 0xE000_EDF8;

/// Bits of FP_CTRL.
pub struct FpCtrl;
impl FpCtrl
{
	pub const ENABLE: u32 = 1 << 0;
	/// Writes are ignored by the unit unless this bit is set.
	pub const KEY: u32 = 1 << 1;
	const NUM_COMP_SHIFT: u32 = 8;
	const NUM_COMP_MASK: u32 = 0xf;

	/// Number of comparators the FlashPatch unit implements, from bits 8 to 11.
	pub fn comparator_count(value: u32) -> usize
	{
		((value >> Self::NUM_COMP_SHIFT) & Self::NUM_COMP_MASK) as usize
	}
}

/// Bits of DHCSR.
pub struct Dhcsr;
impl Dhcsr
{
	/// Must be in the top half of every write or the write is ignored.
	pub const KEY: u32 = 0xA05F << 16;

	pub const C_DEBUGEN: u32 = 1 << 0;
	pub const C_HALT: u32 = 1 << 1;
	pub const C_STEP: u32 = 1 << 2;

	pub const S_REGRDY: u32 = 1 << 16;
	pub const S_HALT: u32 = 1 << 17;
	pub const S_SLEEP: u32 = 1 << 18;
	pub const S_LOCKUP: u32 = 1 << 19;
	pub const S_RETIRE_ST: u32 = 1 << 24;
	pub const S_RESET_ST: u32 = 1 << 25;

	/// Let the core run, keeping halting debug enabled.
	pub const RUN: u32 = Self::KEY | Self::C_DEBUGEN;
	/// Halt the core.
	pub const HALT: u32 = Self::KEY | Self::C_HALT | Self::C_DEBUGEN;
	/// Execute one instruction and halt again.
	pub const STEP: u32 = Self::KEY | Self::C_STEP | Self::C_DEBUGEN;
}

/// Set in a DCRSR write to move DCRDR into the selected register rather than the reverse.
pub const DCRSR_REGWNR: u32 = 1 << 16;

/// The core registers reachable through DCRSR/DCRDR.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CoreRegister
{
	R0,
	R1,
	R2,
	R3,
	R4,
	R5,
	R6,
	R7,
	R8,
	R9,
	R10,
	R11,
	R12,
	Sp,
	Lr,
	/// The debug return address, which is where the core resumes from.
	Pc,
	Xpsr,
	Msp,
	Psp,
	/// CONTROL, FAULTMASK, BASEPRI and PRIMASK packed into one word.
	Special,
}

impl CoreRegister
{
	pub const ALL: [CoreRegister; 20] = [
		Self::R0,
		Self::R1,
		Self::R2,
		Self::R3,
		Self::R4,
		Self::R5,
		Self::R6,
		Self::R7,
		Self::R8,
		Self::R9,
		Self::R10,
		Self::R11,
		Self::R12,
		Self::Sp,
		Self::Lr,
		Self::Pc,
		Self::Xpsr,
		Self::Msp,
		Self::Psp,
		Self::Special,
	];

	/// The REGSEL value DCRSR expects for this register.
	pub fn selector(self) -> u32
	{
		match self {
			Self::R0 => 0,
			Self::R1 => 1,
			Self::R2 => 2,
			Self::R3 => 3,
			Self::R4 => 4,
			Self::R5 => 5,
			Self::R6 => 6,
			Self::R7 => 7,
			Self::R8 => 8,
			Self::R9 => 9,
			Self::R10 => 10,
			Self::R11 => 11,
			Self::R12 => 12,
			Self::Sp => 13,
			Self::Lr => 14,
			Self::Pc => 15,
			Self::Xpsr => 16,
			Self::Msp => 17,
			Self::Psp => 18,
			Self::Special => 20,
		}
	}

	pub fn name(self) -> &'static str
	{
		match self {
			Self::R0 => "r0",
			Self::R1 => "r1",
			Self::R2 => "r2",
			Self::R3 => "r3",
			Self::R4 => "r4",
			Self::R5 => "r5",
			Self::R6 => "r6",
			Self::R7 => "r7",
			Self::R8 => "r8",
			Self::R9 => "r9",
			Self::R10 => "r10",
			Self::R11 => "r11",
			Self::R12 => "r12",
			Self::Sp => "sp",
			Self::Lr => "lr",
			Self::Pc => "pc",
			Self::Xpsr => "xpsr",
			Self::Msp => "msp",
			Self::Psp => "psp",
			Self::Special => "control",
		}
	}
}

impl Display for CoreRegister
{
	fn fmt(&self, f: &mut Formatter) -> fmt::Result
	{
		f.pad(self.name())
	}
}

impl FromStr for CoreRegister
{
	type Err = Error;

	fn from_str(name: &str) -> Result<Self, Self::Err>
	{
		let name = name.to_ascii_lowercase();
		let alias = match name.as_str() {
			"r13" => "sp",
			"r14" => "lr",
			"r15" => "pc",
			"psr" => "xpsr",
			"special" => "control",
			other => other,
		};
		Self::ALL
			.into_iter()
			.find(|register| register.name() == alias)
			.ok_or_else(|| Error::invalid_argument(format!("unknown core register '{}'", name)))
	}
}

/// The status half of DHCSR.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CoreStatus
{
	pub halted: bool,
	pub sleeping: bool,
	pub locked_up: bool,
	pub register_ready: bool,
	/// An instruction has retired since DHCSR was last read.
	pub retired: bool,
	/// The core has been reset since DHCSR was last read.
	pub reset: bool,
}

impl From<u32> for CoreStatus
{
	fn from(dhcsr: u32) -> Self
	{
		Self {
			halted: dhcsr & Dhcsr::S_HALT != 0,
			sleeping: dhcsr & Dhcsr::S_SLEEP != 0,
			locked_up: dhcsr & Dhcsr::S_LOCKUP != 0,
			register_ready: dhcsr & Dhcsr::S_REGRDY != 0,
			retired: dhcsr & Dhcsr::S_RETIRE_ST != 0,
			reset: dhcsr & Dhcsr::S_RESET_ST != 0,
		}
	}
}

impl Display for CoreStatus
{
	fn fmt(&self, f: &mut Formatter) -> fmt::Result
	{
		let state = if self.locked_up {
			"locked up"
		} else if self.halted {
			"halted"
		} else if self.sleeping {
			"sleeping"
		} else {
			"running"
		};
		write!(f, "{}", state)?;
		if self.reset {
			write!(f, " (reset since last check)")?;
		}
		Ok(())
	}
}

impl<T> ProbeLink<T>
where
	T: Transport,
{
	/// Write `value` into a core register: load DCRDR, then trigger the transfer through DCRSR.
	pub fn write_register(&mut self, register: CoreRegister, value: u32) -> Result<(), Error>
	{
		trace!("{} <- {:#010x}", register, value);
		self.write_word(DCRDR, value)?;
		self.write_word(DCRSR, register.selector() | DCRSR_REGWNR)
	}

	/// Read a core register: select it through DCRSR, then fetch the value from DCRDR.
	pub fn read_register(&mut self, register: CoreRegister) -> Result<u32, Error>
	{
		self.write_word(DCRSR, register.selector())?;
		let value = self.read_word(DCRDR)?;
		trace!("{} -> {:#010x}", register, value);
		Ok(value)
	}

	pub fn read_core_status(&mut self) -> Result<CoreStatus, Error>
	{
		Ok(self.read_word(DHCSR)?.into())
	}
}
