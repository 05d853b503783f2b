// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! Bookkeeping and programming of the FlashPatch unit's hardware breakpoint comparators.

use log::{debug, warn};

use crate::error::Error;
use crate::memory::ProbeLink;
use crate::registers::{FP_COMP_BASE, FpCtrl};
use crate::transport::Transport;

/// Comparators can only match addresses in the Code region, below this.
const COMPARATOR_ADDRESS_LIMIT: u32 = 0x2000_0000;
/// Bits 28:2 of the address to match.
const COMPARATOR_ADDRESS_MASK: u32 = 0x1fff_fffc;
const COMPARATOR_ENABLE: u32 = 1 << 0;
const COMPARATOR_REPLACE_SHIFT: u32 = 30;
/// Breakpoint on the lower half-word at the comparator address.
const REPLACE_LOWER_HALFWORD: u32 = 0b01;
/// Breakpoint on the upper half-word at the comparator address.
const REPLACE_UPPER_HALFWORD: u32 = 0b10;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlotState
{
	Free,
	Allocated
	{
		address: u32,
	},
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BreakpointSlot
{
	index: usize,
	state: SlotState,
}

impl BreakpointSlot
{
	pub fn index(&self) -> usize
	{
		self.index
	}

	pub fn state(&self) -> SlotState
	{
		self.state
	}

	pub fn is_enabled(&self) -> bool
	{
		matches!(self.state, SlotState::Allocated { .. })
	}

	pub fn address(&self) -> Option<u32>
	{
		match self.state {
			SlotState::Allocated { address } => Some(address),
			SlotState::Free => None,
		}
	}

	/// Address of the FP_COMP register backing this slot.
	pub fn comparator_address(&self) -> u32
	{
		comparator_address(self.index)
	}
}

/// What kind of data access a watchpoint should trigger on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WatchKind
{
	Read,
	Write,
	ReadWrite,
}

/// Fixed-size table of the comparator slots the target implements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointTable
{
	slots: Vec<BreakpointSlot>,
}

impl BreakpointTable
{
	pub fn new(limit: usize) -> Self
	{
		Self {
			slots: (0..limit)
				.map(|index| BreakpointSlot {
					index,
					state: SlotState::Free,
				})
				.collect(),
		}
	}

	/// Size the table from the comparator count field of an FP_CTRL value.
	pub fn from_fp_ctrl(fp_ctrl: u32) -> Self
	{
		Self::new(FpCtrl::comparator_count(fp_ctrl))
	}

	/// Number of comparators, and so the number of breakpoints that can be set at once.
	pub fn limit(&self) -> usize
	{
		self.slots.len()
	}

	pub fn slots(&self) -> &[BreakpointSlot]
	{
		&self.slots
	}

	/// The lowest indexed free slot, if any.
	pub fn first_free(&self) -> Option<usize>
	{
		self.slots
			.iter()
			.position(|slot| !slot.is_enabled())
	}

	/// The slot currently breaking on `address`, if any.
	pub fn find(&self, address: u32) -> Option<usize>
	{
		self.slots
			.iter()
			.position(|slot| slot.address() == Some(address))
	}

	/// Program the lowest free comparator to break on `address`, returning its index.
	///
	/// Fails with [`Error::ResourceExhausted`] when every comparator is taken, and with
	/// [`Error::InvalidArgument`] for addresses outside the Code region (at or above
	/// `0x2000_0000`), which the comparators cannot match.
	pub fn set_breakpoint<T>(&mut self, link: &mut ProbeLink<T>, address: u32) -> Result<usize, Error>
	where
		T: Transport,
	{
		let index = self.first_free().ok_or(Error::ResourceExhausted {
			limit: self.limit(),
		})?;
		let value = comparator_value(address)?;

		link.write_word(comparator_address(index), value)?;
		self.slots[index].state = SlotState::Allocated {
			address,
		};
		debug!("Breakpoint {} set at {:#010x} (FP_COMP = {:#010x})", index, address, value);
		Ok(index)
	}

	/// Disable comparator `index` and make its slot available again.
	pub fn remove_breakpoint<T>(&mut self, link: &mut ProbeLink<T>, index: usize) -> Result<(), Error>
	where
		T: Transport,
	{
		match self.slots.get(index) {
			None => {
				return Err(Error::invalid_argument(format!(
					"breakpoint {} is out of range, the target has {}",
					index,
					self.limit()
				)));
			},
			Some(slot) if !slot.is_enabled() => {
				return Err(Error::invalid_argument(format!("breakpoint {} is not set", index)));
			},
			Some(_) => {},
		}

		link.write_word(comparator_address(index), 0)?;
		self.slots[index].state = SlotState::Free;
		debug!("Breakpoint {} removed", index);
		Ok(())
	}

	/// Watchpoints need the DWT unit, which the probe's protocol doesn't drive yet, so this
	/// accepts the request without doing anything.
	pub fn set_watchpoint(&mut self, address: u32, kind: WatchKind) -> Result<(), Error>
	{
		warn!("Ignoring {:?} watchpoint at {:#010x}, watchpoints are not supported", kind, address);
		Ok(())
	}
}

pub fn comparator_address(index: usize) -> u32
{
	FP_COMP_BASE + 4 * index as u32
}

/// Build the FP_COMP value that breaks on the instruction at `address`.
///
/// The comparator matches a word address, REPLACE then picks which half-word of it the
/// breakpoint applies to. Bit 0 (the Thumb bit) is ignored.
pub fn comparator_value(address: u32) -> Result<u32, Error>
{
	if address >= COMPARATOR_ADDRESS_LIMIT {
		return Err(Error::invalid_argument(format!(
			"cannot break on {:#010x}, hardware breakpoints only cover addresses below {:#010x}",
			address, COMPARATOR_ADDRESS_LIMIT
		)));
	}

	let replace = if address & 2 == 0 {
		REPLACE_LOWER_HALFWORD
	} else {
		REPLACE_UPPER_HALFWORD
	};
	Ok((replace << COMPARATOR_REPLACE_SHIFT) | (address & COMPARATOR_ADDRESS_MASK) | COMPARATOR_ENABLE)
}
