// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

mod common;

#[cfg(test)]
mod tests
{
	use color_eyre::eyre::Result;
	use inception::protocol::Command;
	use inception::registers::{CoreRegister, DHCSR, FP_CTRL};
	use inception::usb::{Pid, UsbTransport, Vid};
	use inception::{Error, LifecycleState, ProbeConfig, Session};

	use crate::common::SimulatedProbe;

	fn attached(comparators: u32) -> Result<(SimulatedProbe, Session<SimulatedProbe>)>
	{
		let probe = SimulatedProbe::with_comparators(comparators);
		let mut session = Session::new(ProbeConfig::new());
		session.attach(probe.clone())?;
		Ok((probe, session))
	}

	fn stopped(comparators: u32) -> Result<(SimulatedProbe, Session<SimulatedProbe>)>
	{
		let (probe, mut session) = attached(comparators)?;
		session.reset()?;
		probe.state().commands.clear();
		Ok((probe, session))
	}

	#[test]
	fn connect_without_a_probe_is_refused()
	{
		let config = ProbeConfig::new().vid(Vid(0xffff)).pid(Pid(0xfffe));
		let mut session: Session<UsbTransport> = Session::new(config);

		assert!(matches!(session.connect(), Err(Error::ConnectionRefused { .. })));
		assert_eq!(session.state(), LifecycleState::Disconnected);
	}

	#[test]
	fn attach_initializes() -> Result<()>
	{
		let (_probe, session) = attached(3)?;

		assert_eq!(session.state(), LifecycleState::Initialized);
		assert_eq!(session.bkpt_limit(), 0);
		Ok(())
	}

	#[test]
	fn reset_discovers_comparators() -> Result<()>
	{
		let (probe, mut session) = attached(3)?;

		session.reset()?;

		assert_eq!(session.state(), LifecycleState::Stopped);
		assert_eq!(session.bkpt_limit(), 3);
		assert!(session.breakpoints().iter().all(|slot| !slot.is_enabled()));

		let state = probe.state();
		assert_eq!(state.resets, 1);
		assert_eq!(
			state.commands,
			vec![Command::read(FP_CTRL), Command::write_word(FP_CTRL, 0b11)]
		);
		// The unit is now enabled and still reports its comparators
		assert_eq!(state.word(FP_CTRL), 0x0000_0301);
		Ok(())
	}

	#[test]
	fn lifecycle_order_is_enforced() -> Result<()>
	{
		let mut session: Session<SimulatedProbe> = Session::new(ProbeConfig::new());
		assert!(matches!(
			session.reset(),
			Err(Error::InvalidState {
				state: LifecycleState::Disconnected,
				..
			})
		));
		assert!(matches!(session.cont(), Err(Error::InvalidState { .. })));
		assert!(matches!(session.read_word(0x2000_0000), Err(Error::InvalidState { .. })));

		let probe = SimulatedProbe::with_comparators(2);
		session.attach(probe.clone())?;
		assert!(matches!(session.attach(probe.clone()), Err(Error::InvalidState { .. })));
		assert!(matches!(session.step(), Err(Error::InvalidState { .. })));
		assert!(matches!(session.set_breakpoint(0x800), Err(Error::InvalidState { .. })));

		session.reset()?;
		assert!(matches!(
			session.reset(),
			Err(Error::InvalidState {
				state: LifecycleState::Stopped,
				..
			})
		));
		Ok(())
	}

	#[test]
	fn cont_and_stop_drive_dhcsr() -> Result<()>
	{
		let (probe, mut session) = stopped(2)?;

		session.cont()?;
		assert_eq!(session.state(), LifecycleState::Running);
		assert!(!session.core_status()?.halted);
		assert!(matches!(session.cont(), Err(Error::InvalidState { .. })));

		session.stop()?;
		assert_eq!(session.state(), LifecycleState::Stopped);
		assert!(session.core_status()?.halted);

		let state = probe.state();
		assert_eq!(state.writes_to(DHCSR), vec![0xA05F_0001, 0xA05F_0003]);
		assert!(state.writes_to(FP_CTRL).is_empty());
		Ok(())
	}

	#[test]
	fn step_enables_debug_once() -> Result<()>
	{
		let (probe, mut session) = stopped(2)?;
		assert!(!session.is_debug_enabled());

		assert_eq!(session.step()?, LifecycleState::Debugging);
		assert!(session.is_debug_enabled());
		assert_eq!(session.step()?, LifecycleState::Debugging);
		assert_eq!(
			probe.state().writes_to(DHCSR),
			vec![0xA05F_0003, 0xA05F_0005, 0xA05F_0005]
		);

		// Running again drops debug mode, so the next step has to re-enable it
		session.cont()?;
		assert!(!session.is_debug_enabled());
		session.stop()?;
		probe.state().commands.clear();
		session.step()?;
		assert_eq!(probe.state().writes_to(DHCSR), vec![0xA05F_0003, 0xA05F_0005]);
		Ok(())
	}

	#[test]
	fn shutdown_is_idempotent() -> Result<()>
	{
		let (probe, mut session) = stopped(2)?;
		session.set_breakpoint(0x800)?;

		session.shutdown();
		session.shutdown();

		assert_eq!(session.state(), LifecycleState::Disconnected);
		assert_eq!(session.bkpt_limit(), 0);
		assert_eq!(probe.state().closed, 1);
		assert!(matches!(session.read_word(0x2000_0000), Err(Error::InvalidState { .. })));

		// A fresh connection goes through the whole lifecycle again
		session.attach(probe.clone())?;
		assert_eq!(session.state(), LifecycleState::Initialized);
		session.reset()?;
		assert_eq!(session.state(), LifecycleState::Stopped);
		Ok(())
	}

	#[test]
	fn dropping_a_connected_session_closes_the_transport() -> Result<()>
	{
		let (probe, session) = stopped(1)?;
		drop(session);

		assert_eq!(probe.state().closed, 1);
		Ok(())
	}

	#[test]
	fn memory_and_registers_pass_through() -> Result<()>
	{
		let (probe, mut session) = stopped(1)?;

		session.write_memory(0x2000_0000, &[1, 2, 3, 4, 5, 6, 7, 8])?;
		assert_eq!(session.read_memory(0x2000_0000, 8)?, vec![1, 2, 3, 4, 5, 6, 7, 8]);
		session.write_word(0x2000_0010, 42)?;
		assert_eq!(session.read_word(0x2000_0010)?, 42);

		session.write_register(CoreRegister::Sp, 0x2000_8000)?;
		assert_eq!(session.read_register(CoreRegister::Sp)?, 0x2000_8000);
		assert_eq!(probe.state().registers[13], 0x2000_8000);
		Ok(())
	}
}
