// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::thread::sleep;
use std::time::{Duration, Instant};

use clap::Args;
use color_eyre::eyre::Result;
use inception::breakpoints::SlotState;
use inception::registers::CoreRegister;
use log::{info, warn};

use crate::CliArguments;
use crate::cli_commands::{parse_number, with_session};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Args)]
pub struct RegsArguments
{
	/// Only print this register (r0-r12, sp, lr, pc, xpsr, msp, psp, special)
	register: Option<CoreRegister>,
}

#[derive(Args)]
pub struct SetRegArguments
{
	/// The register to set
	register: CoreRegister,
	#[arg(value_parser = parse_number)]
	/// Value to put in the register
	value: u32,
}

#[derive(Args)]
pub struct StepArguments
{
	#[arg(default_value_t = 1)]
	/// How many instructions to execute
	count: usize,
}

#[derive(Args)]
pub struct RunToArguments
{
	#[arg(value_parser = parse_number)]
	/// Address of the instruction to stop at
	address: u32,
	#[arg(long = "wait", value_name = "MS", default_value_t = 1000)]
	/// How long to wait for the target to get there, in milliseconds
	wait_ms: u64,
}

pub fn info_command(cli_args: &CliArguments) -> Result<()>
{
	with_session(cli_args, |session| {
		let status = session.core_status()?;
		let config = session.config();
		println!("Probe:       {}:{}", config.get_vid(), config.get_pid());
		println!("Session:     {}", session.state());
		println!("Core:        {}", status);
		println!("Breakpoints: {}", session.bkpt_limit());
		for slot in session.breakpoints() {
			if let SlotState::Allocated { address } = slot.state() {
				println!("  {}: {:#010x}", slot.index(), address);
			}
		}
		Ok(())
	})
}

pub fn regs_command(cli_args: &CliArguments, regs_args: &RegsArguments) -> Result<()>
{
	let registers = match regs_args.register {
		Some(register) => vec![register],
		None => CoreRegister::ALL.to_vec(),
	};
	with_session(cli_args, |session| {
		for register in registers {
			let value = session.read_register(register)?;
			println!("{:>8}: {:#010x}", register, value);
		}
		Ok(())
	})
}

pub fn set_reg_command(cli_args: &CliArguments, set_reg_args: &SetRegArguments) -> Result<()>
{
	with_session(cli_args, |session| {
		Ok(session.write_register(set_reg_args.register, set_reg_args.value)?)
	})?;
	info!("{} set to {:#010x}", set_reg_args.register, set_reg_args.value);
	Ok(())
}

pub fn halt_command(cli_args: &CliArguments) -> Result<()>
{
	with_session(cli_args, |session| {
		session.stop()?;
		info!("Target halted at {:#010x}", session.read_register(CoreRegister::Pc)?);
		Ok(())
	})
}

pub fn resume_command(cli_args: &CliArguments) -> Result<()>
{
	with_session(cli_args, |session| Ok(session.cont()?))?;
	info!("Target running");
	Ok(())
}

pub fn step_command(cli_args: &CliArguments, step_args: &StepArguments) -> Result<()>
{
	with_session(cli_args, |session| {
		for _ in 0..step_args.count {
			session.step()?;
		}
		let pc = session.read_register(CoreRegister::Pc)?;
		info!("Stepped {} instruction(s), now at {:#010x}", step_args.count, pc);
		Ok(())
	})
}

pub fn run_to_command(cli_args: &CliArguments, run_to_args: &RunToArguments) -> Result<()>
{
	let wait = Duration::from_millis(run_to_args.wait_ms);
	with_session(cli_args, |session| {
		// Leave a breakpoint that was already there in place afterwards
		let existing = session.find_breakpoint(run_to_args.address);
		let index = match existing {
			Some(index) => index,
			None => session.set_breakpoint(run_to_args.address)?,
		};
		session.cont()?;

		let deadline = Instant::now() + wait;
		let reached = loop {
			if session.core_status()?.halted {
				break true;
			}
			if Instant::now() >= deadline {
				break false;
			}
			sleep(POLL_INTERVAL);
		};

		// Either way the core gets halted so the breakpoint can be taken back out
		session.stop()?;
		if existing.is_none() {
			session.remove_breakpoint(index)?;
		}
		let pc = session.read_register(CoreRegister::Pc)?;
		if reached {
			info!("Target stopped at {:#010x}", pc);
		} else {
			warn!(
				"Target did not reach {:#010x} within {:?}, halted at {:#010x}",
				run_to_args.address, wait, pc
			);
		}
		Ok(())
	})
}
