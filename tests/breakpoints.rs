// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

mod common;

#[cfg(test)]
mod tests
{
	use color_eyre::eyre::Result;
	use inception::breakpoints::WatchKind;
	use inception::registers::FP_COMP_BASE;
	use inception::{Error, ProbeConfig, Session};

	use crate::common::SimulatedProbe;

	fn stopped(comparators: u32) -> Result<(SimulatedProbe, Session<SimulatedProbe>)>
	{
		let probe = SimulatedProbe::with_comparators(comparators);
		let mut session = Session::new(ProbeConfig::new());
		session.attach(probe.clone())?;
		session.reset()?;
		probe.state().commands.clear();
		Ok((probe, session))
	}

	#[test]
	fn slots_are_handed_out_lowest_first_until_exhausted() -> Result<()>
	{
		let (probe, mut session) = stopped(3)?;

		let indices = [
			session.set_breakpoint(0x0000_0800)?,
			session.set_breakpoint(0x0000_0900)?,
			session.set_breakpoint(0x0000_0a02)?,
		];
		assert_eq!(indices, [0, 1, 2]);

		assert!(matches!(
			session.set_breakpoint(0x0000_0b00),
			Err(Error::ResourceExhausted { limit: 3 })
		));

		let state = probe.state();
		assert_eq!(state.write_addresses(), vec![FP_COMP_BASE, FP_COMP_BASE + 4, FP_COMP_BASE + 8]);
		assert_eq!(state.word(FP_COMP_BASE), 0x4000_0801);
		assert_eq!(state.word(FP_COMP_BASE + 4), 0x4000_0901);
		assert_eq!(state.word(FP_COMP_BASE + 8), 0x8000_0a01);
		Ok(())
	}

	#[test]
	fn removed_slots_are_reused() -> Result<()>
	{
		let (probe, mut session) = stopped(3)?;
		for address in [0x1000, 0x2000, 0x3000] {
			session.set_breakpoint(address)?;
		}

		session.remove_breakpoint(1)?;
		assert_eq!(probe.state().word(FP_COMP_BASE + 4), 0);
		assert!(!session.breakpoints()[1].is_enabled());

		assert_eq!(session.set_breakpoint(0x4000)?, 1);
		assert_eq!(session.breakpoints()[1].address(), Some(0x4000));
		Ok(())
	}

	#[test]
	fn breakpoints_are_found_by_address() -> Result<()>
	{
		let (_probe, mut session) = stopped(3)?;
		session.set_breakpoint(0x1000)?;
		session.set_breakpoint(0x2000)?;

		assert_eq!(session.find_breakpoint(0x2000), Some(1));
		assert_eq!(session.find_breakpoint(0x3000), None);

		session.remove_breakpoint(1)?;
		assert_eq!(session.find_breakpoint(0x2000), None);
		assert_eq!(session.find_breakpoint(0x1000), Some(0));
		Ok(())
	}

	#[test]
	fn removing_a_free_or_missing_slot_is_invalid() -> Result<()>
	{
		let (probe, mut session) = stopped(2)?;

		assert!(matches!(session.remove_breakpoint(0), Err(Error::InvalidArgument { .. })));
		assert!(matches!(session.remove_breakpoint(2), Err(Error::InvalidArgument { .. })));

		session.set_breakpoint(0x800)?;
		session.remove_breakpoint(0)?;
		assert!(matches!(session.remove_breakpoint(0), Err(Error::InvalidArgument { .. })));

		// Only the one valid set and remove reached the target
		assert_eq!(probe.state().writes_to(FP_COMP_BASE), vec![0x4000_0801, 0]);
		Ok(())
	}

	#[test]
	fn failed_comparator_write_leaves_the_slot_free() -> Result<()>
	{
		let (probe, mut session) = stopped(2)?;
		{
			let mut state = probe.state();
			state.fail_at = Some(FP_COMP_BASE);
			state.fail_status = 0x01;
		}

		assert!(matches!(session.set_breakpoint(0x800), Err(Error::ProtocolError { .. })));
		assert!(session.breakpoints().iter().all(|slot| !slot.is_enabled()));

		probe.state().fail_at = None;
		assert_eq!(session.set_breakpoint(0x800)?, 0);
		Ok(())
	}

	#[test]
	fn unreachable_addresses_are_rejected() -> Result<()>
	{
		let (probe, mut session) = stopped(2)?;

		assert!(matches!(session.set_breakpoint(0x2000_0000), Err(Error::InvalidArgument { .. })));
		assert!(probe.state().commands.is_empty());
		Ok(())
	}

	#[test]
	fn target_without_comparators() -> Result<()>
	{
		let (_probe, mut session) = stopped(0)?;

		assert_eq!(session.bkpt_limit(), 0);
		assert!(matches!(session.set_breakpoint(0x800), Err(Error::ResourceExhausted { limit: 0 })));
		Ok(())
	}

	#[test]
	fn watchpoints_are_accepted_without_target_access() -> Result<()>
	{
		let (probe, mut session) = stopped(2)?;

		session.set_watchpoint(0x2000_0000, WatchKind::Write)?;
		assert!(probe.state().commands.is_empty());
		Ok(())
	}
}
