// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! The debug session: owns the link to a probe and drives it through its lifecycle.
//!
//! ```text
//! Disconnected --connect()--> Initialized --reset()--> Stopped <--stop()-- Running
//!                                                      |   ^                  ^
//!                                                 step()   cont()/stop()      |
//!                                                      v   |                  |
//!                                                    Debugging ---cont()------+
//! ```
//!
//! `shutdown()` takes any state back to `Disconnected`.

use std::fmt::{self, Display, Formatter};

use log::{debug, info, warn};

use crate::breakpoints::{BreakpointSlot, BreakpointTable, WatchKind};
use crate::config::ProbeConfig;
use crate::error::Error;
use crate::log_and_return;
use crate::memory::ProbeLink;
use crate::protocol::RESET_COMMAND;
use crate::registers::{CoreRegister, CoreStatus, DHCSR, Dhcsr, FP_CTRL, FpCtrl};
use crate::transport::{OpenTransport, Transport};
use crate::usb::UsbTransport;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LifecycleState
{
	/// No probe attached.
	Disconnected,
	/// Probe attached, target not yet reset.
	Initialized,
	/// Target executing.
	Running,
	/// Target halted.
	Stopped,
	/// Stopped with debug enabled: the target is halted and halting debug has been turned on
	/// for single stepping. Further steps stay here, `cont()` and `stop()` leave it.
	Debugging,
}

impl LifecycleState
{
	/// Whether the target core is halted.
	pub fn is_halted(self) -> bool
	{
		matches!(self, Self::Stopped | Self::Debugging)
	}

	/// Whether `reset()` has been run on this connection.
	pub fn is_reset(self) -> bool
	{
		matches!(self, Self::Running | Self::Stopped | Self::Debugging)
	}
}

impl Display for LifecycleState
{
	fn fmt(&self, f: &mut Formatter) -> fmt::Result
	{
		let name = match self {
			Self::Disconnected => "disconnected",
			Self::Initialized => "initialized",
			Self::Running => "running",
			Self::Stopped => "stopped",
			Self::Debugging => "debugging",
		};
		f.write_str(name)
	}
}

/// A debug session with one Inception probe.
///
/// The session exclusively owns the probe's transport while connected, and every operation
/// runs to completion (or failure) before returning. Share one between threads only behind
/// a lock.
pub struct Session<T = UsbTransport>
where
	T: Transport,
{
	config: ProbeConfig,
	link: Option<ProbeLink<T>>,
	state: LifecycleState,
	breakpoints: BreakpointTable,
}

impl<T> Session<T>
where
	T: Transport,
{
	pub fn new(config: ProbeConfig) -> Self
	{
		Self {
			config,
			link: None,
			state: LifecycleState::Disconnected,
			breakpoints: BreakpointTable::default(),
		}
	}

	pub fn config(&self) -> &ProbeConfig
	{
		&self.config
	}

	pub fn state(&self) -> LifecycleState
	{
		self.state
	}

	/// Whether halting debug has been enabled for single stepping since the last run or halt.
	pub fn is_debug_enabled(&self) -> bool
	{
		self.state == LifecycleState::Debugging
	}

	/// Number of hardware breakpoints the target supports, known after `reset()`.
	pub fn bkpt_limit(&self) -> usize
	{
		self.breakpoints.limit()
	}

	pub fn breakpoints(&self) -> &[BreakpointSlot]
	{
		self.breakpoints.slots()
	}

	/// Take an already opened transport as this session's link to the probe.
	pub fn attach(&mut self, transport: T) -> Result<(), Error>
	{
		self.expect_state("attach a probe", |state| state == LifecycleState::Disconnected)?;
		self.link = Some(ProbeLink::new(transport, self.config.get_timeout()));
		self.transition(LifecycleState::Initialized);
		Ok(())
	}

	/// Reset the target's debug port, discover how many breakpoints it has and enable them.
	pub fn reset(&mut self) -> Result<(), Error>
	{
		self.expect_state("reset the target", |state| state == LifecycleState::Initialized)?;
		let link = self.link_mut("reset the target")?;
		link.send_raw(&RESET_COMMAND)?;

		let fp_ctrl = link.read_word(FP_CTRL)?;
		let breakpoints = BreakpointTable::from_fp_ctrl(fp_ctrl);
		info!("Number of available breakpoints {}", breakpoints.limit());
		link.write_word(FP_CTRL, FpCtrl::KEY | FpCtrl::ENABLE)?;

		self.breakpoints = breakpoints;
		self.transition(LifecycleState::Stopped);
		Ok(())
	}

	/// Let the target run.
	pub fn cont(&mut self) -> Result<(), Error>
	{
		self.expect_state("resume the target", LifecycleState::is_halted)?;
		self.link_mut("resume the target")?
			.write_word(DHCSR, Dhcsr::RUN)?;
		self.transition(LifecycleState::Running);
		Ok(())
	}

	/// Halt the target.
	pub fn stop(&mut self) -> Result<(), Error>
	{
		self.expect_state("halt the target", LifecycleState::is_reset)?;
		self.link_mut("halt the target")?
			.write_word(DHCSR, Dhcsr::HALT)?;
		self.transition(LifecycleState::Stopped);
		Ok(())
	}

	/// Execute a single instruction, enabling halting debug first if this is the first step
	/// since the target was last run or halted.
	pub fn step(&mut self) -> Result<LifecycleState, Error>
	{
		self.expect_state("step the target", LifecycleState::is_halted)?;
		let enable_debug = !self.is_debug_enabled();
		let link = self.link_mut("step the target")?;
		if enable_debug {
			link.write_word(DHCSR, Dhcsr::HALT)?;
		}
		link.write_word(DHCSR, Dhcsr::STEP)?;

		if enable_debug {
			self.transition(LifecycleState::Debugging);
		}
		Ok(self.state)
	}

	/// Release the probe. Safe to call in any state, any number of times.
	pub fn shutdown(&mut self)
	{
		if let Some(link) = self.link.take() {
			let mut transport = link.into_inner();
			transport.close();
		}
		self.breakpoints = BreakpointTable::default();
		if self.state != LifecycleState::Disconnected {
			self.transition(LifecycleState::Disconnected);
		}
	}

	/// The comparator slot currently breaking on `address`, if any.
	pub fn find_breakpoint(&self, address: u32) -> Option<usize>
	{
		self.breakpoints.find(address)
	}

	/// Program a hardware breakpoint at `address`, returning the comparator slot used.
	///
	/// Besides running out of comparators, this fails with [`Error::InvalidArgument`] for
	/// addresses at or above `0x2000_0000`, outside the range the comparators can match.
	pub fn set_breakpoint(&mut self, address: u32) -> Result<usize, Error>
	{
		self.expect_state("set a breakpoint", LifecycleState::is_reset)?;
		let link = self.link.as_mut().ok_or(Error::InvalidState {
			operation: "set a breakpoint",
			state: self.state,
		})?;
		self.breakpoints.set_breakpoint(link, address)
	}

	/// Clear the breakpoint in slot `index`.
	pub fn remove_breakpoint(&mut self, index: usize) -> Result<(), Error>
	{
		self.expect_state("remove a breakpoint", LifecycleState::is_reset)?;
		let link = self.link.as_mut().ok_or(Error::InvalidState {
			operation: "remove a breakpoint",
			state: self.state,
		})?;
		self.breakpoints.remove_breakpoint(link, index)
	}

	/// Accepted for interface completeness, but performs no target access.
	pub fn set_watchpoint(&mut self, address: u32, kind: WatchKind) -> Result<(), Error>
	{
		self.expect_state("set a watchpoint", LifecycleState::is_reset)?;
		self.breakpoints.set_watchpoint(address, kind)
	}

	pub fn read_memory(&mut self, address: u32, size: usize) -> Result<Vec<u8>, Error>
	{
		self.link_mut("read memory")?
			.read_memory(address, size)
	}

	pub fn read_word(&mut self, address: u32) -> Result<u32, Error>
	{
		self.link_mut("read memory")?.read_word(address)
	}

	pub fn write_memory(&mut self, address: u32, data: &[u8]) -> Result<(), Error>
	{
		self.link_mut("write memory")?
			.write_memory(address, data)
	}

	pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), Error>
	{
		self.link_mut("write memory")?
			.write_word(address, value)
	}

	pub fn read_register(&mut self, register: CoreRegister) -> Result<u32, Error>
	{
		self.link_mut("read a register")?
			.read_register(register)
	}

	pub fn write_register(&mut self, register: CoreRegister, value: u32) -> Result<(), Error>
	{
		self.link_mut("write a register")?
			.write_register(register, value)
	}

	/// Read back the core's run/halt status from DHCSR.
	pub fn core_status(&mut self) -> Result<CoreStatus, Error>
	{
		self.link_mut("read the core status")?
			.read_core_status()
	}

	fn link_mut(&mut self, operation: &'static str) -> Result<&mut ProbeLink<T>, Error>
	{
		match self.link.as_mut() {
			Some(link) => Ok(link),
			None => Err(Error::InvalidState {
				operation,
				state: self.state,
			}),
		}
	}

	fn expect_state<F>(&self, operation: &'static str, allowed: F) -> Result<(), Error>
	where
		F: Fn(LifecycleState) -> bool,
	{
		if !allowed(self.state) {
			log_and_return!(Error::InvalidState {
				operation,
				state: self.state,
			});
		}
		Ok(())
	}

	fn transition(&mut self, next: LifecycleState)
	{
		debug!("Session {} -> {}", self.state, next);
		self.state = next;
	}
}

impl<T> Session<T>
where
	T: OpenTransport,
{
	/// Find and open the probe described by the session's configuration.
	pub fn connect(&mut self) -> Result<(), Error>
	{
		self.expect_state("connect to a probe", |state| state == LifecycleState::Disconnected)?;
		let transport = T::open(&self.config)?;
		info!(
			"Connected to Inception probe {}:{}",
			self.config.get_vid(),
			self.config.get_pid()
		);
		self.attach(transport)
	}

	/// Connect to the configured probe and reset its target, leaving it stopped.
	pub fn open(config: ProbeConfig) -> Result<Self, Error>
	{
		let mut session = Self::new(config);
		session.connect()?;
		session.reset()?;
		Ok(session)
	}
}

impl<T> Drop for Session<T>
where
	T: Transport,
{
	fn drop(&mut self)
	{
		if self.link.is_some() {
			warn!("Session dropped while still connected, shutting down");
			self.shutdown();
		}
	}
}
