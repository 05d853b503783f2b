// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::num::ParseIntError;
use std::time::Duration;

use clap::Subcommand;
use color_eyre::eyre::Result;
use inception::usb::{Pid, Vid};
use inception::{InceptionParams, ProbeConfig, Session};
use log::debug;

use crate::cli_commands::memory::{ReadArguments, WriteArguments};
use crate::cli_commands::target::{RegsArguments, RunToArguments, SetRegArguments, StepArguments};
use crate::{CliArguments, CompletionArguments};

pub mod memory;
pub mod target;

#[derive(Subcommand)]
pub enum ToplevelCommmands
{
	/// Connect to the probe and report what the target's debug unit looks like
	Info,
	/// Read target memory and print it as a hex dump
	Read(ReadArguments),
	/// Write a 32-bit word to target memory
	Write(WriteArguments),
	/// Print the target's core registers
	Regs(RegsArguments),
	/// Set one of the target's core registers
	SetReg(SetRegArguments),
	/// Halt the target
	Halt,
	/// Let the target run
	Resume,
	/// Execute single instructions on the target
	Step(StepArguments),
	/// Run the target until it reaches an address, using a hardware breakpoint
	RunTo(RunToArguments),
	/// Generate completions data for the shell
	Complete(CompletionArguments),
}

impl ToplevelCommmands
{
	pub fn run(&self, cli_args: &CliArguments) -> Result<()>
	{
		match self {
			Self::Info => target::info_command(cli_args),
			Self::Read(read_args) => memory::read_command(cli_args, read_args),
			Self::Write(write_args) => memory::write_command(cli_args, write_args),
			Self::Regs(regs_args) => target::regs_command(cli_args, regs_args),
			Self::SetReg(set_reg_args) => target::set_reg_command(cli_args, set_reg_args),
			Self::Halt => target::halt_command(cli_args),
			Self::Resume => target::resume_command(cli_args),
			Self::Step(step_args) => target::step_command(cli_args, step_args),
			Self::RunTo(run_to_args) => target::run_to_command(cli_args, run_to_args),
			// Completions don't need a probe, main() deals with them
			Self::Complete(_) => Ok(()),
		}
	}
}

impl InceptionParams for CliArguments
{
	fn vid(&self) -> Option<Vid>
	{
		self.vid
	}

	fn pid(&self) -> Option<Pid>
	{
		self.pid
	}

	fn serial_number(&self) -> Option<&str>
	{
		self.serial_number.as_deref()
	}

	fn index(&self) -> Option<usize>
	{
		self.index
	}

	fn timeout(&self) -> Option<Duration>
	{
		self.timeout_ms.map(Duration::from_millis)
	}
}

/// Connect to the probe the invocation asks for, reset its target and run `action` against it.
/// The probe is released again whether or not `action` succeeds.
pub fn with_session<F, R>(cli_args: &CliArguments, action: F) -> Result<R>
where
	F: FnOnce(&mut Session) -> Result<R>,
{
	let config = ProbeConfig::from_params(cli_args);
	debug!("Opening probe with {:?}", config);
	let mut session = Session::open(config)?;
	let result = action(&mut session);
	session.shutdown();
	result
}

/// Parse a number given either in decimal or as hex with a leading `0x`.
pub fn parse_number(value: &str) -> Result<u32, ParseIntError>
{
	match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
		None => value.parse(),
	}
}

pub fn parse_size(value: &str) -> Result<usize, ParseIntError>
{
	parse_number(value).map(|size| size as usize)
}

fn parse_id(value: &str) -> Result<u16, ParseIntError>
{
	let value = value
		.strip_prefix("0x")
		.or_else(|| value.strip_prefix("0X"))
		.unwrap_or(value);
	u16::from_str_radix(value, 16)
}

pub fn parse_vid(value: &str) -> Result<Vid, ParseIntError>
{
	parse_id(value).map(Vid)
}

pub fn parse_pid(value: &str) -> Result<Pid, ParseIntError>
{
	parse_id(value).map(Pid)
}
