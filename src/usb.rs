// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::fmt::{self, Display};
use std::io;
use std::time::Duration;

use async_io::{Timer, block_on};
use futures_lite::FutureExt;
use log::{debug, trace, warn};
use nusb::transfer::RequestBuffer;
use nusb::{Device, DeviceInfo, Interface};

use crate::config::ProbeConfig;
use crate::error::Error;
use crate::transport::{OpenTransport, Transport};

/// Simple newtype struct for some clarity in function arguments and whatnot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Vid(pub u16);

/// Simple newtype struct for some clarity in function arguments and whatnot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u16);

impl Display for Vid
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		write!(f, "{:04x}", self.0)
	}
}

impl Display for Pid
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		write!(f, "{:04x}", self.0)
	}
}

pub struct InceptionVidPid;
impl InceptionVidPid
{
	pub const VID: Vid = Vid(0x04b4);
	pub const PID: Pid = Pid(0x00f1);
}

/// Fixed endpoint addresses of the Inception probe's interface 0.
pub struct Endpoint;
impl Endpoint
{
	/// Command packets, host to probe.
	pub const COMMAND_OUT: u8 = 0x01;
	/// Response packets, probe to host.
	pub const RESPONSE_IN: u8 = 0x81;
	/// Asynchronous notifications, probe to host. Claimed but not used by the core operations.
	pub const INTERRUPT_IN: u8 = 0x82;

	pub const REQUIRED: [u8; 3] = [Self::COMMAND_OUT, Self::RESPONSE_IN, Self::INTERRUPT_IN];
}

const INTERFACE_NUMBER: u8 = 0;
const DEFAULT_CONFIGURATION: u8 = 1;
/// Large enough for a full high-speed bulk packet, which is far more than a response needs.
const RESPONSE_BUFFER_LENGTH: usize = 512;

/// [`Transport`] over the probe's USB bulk endpoints.
pub struct UsbTransport
{
	interface: Option<Interface>,
}

impl UsbTransport
{
	/// Find the first connected device matching the configuration's VID/PID and filters.
	fn find_device(config: &ProbeConfig) -> Result<DeviceInfo, Error>
	{
		let refused = |source: Option<io::Error>| Error::ConnectionRefused {
			vid: config.get_vid(),
			pid: config.get_pid(),
			source,
		};

		let devices = nusb::list_devices().map_err(|e| refused(Some(e)))?;
		devices
			.filter(|dev| dev.vendor_id() == config.get_vid().0 && dev.product_id() == config.get_pid().0)
			.filter(|dev| {
				config
					.get_serial()
					.is_none_or(|serial| dev.serial_number() == Some(serial))
			})
			.nth(config.get_index().unwrap_or(0))
			.ok_or_else(|| refused(None))
	}

	/// Make sure interface 0 carries all three endpoints the protocol needs.
	fn check_endpoints(device: &Device) -> Result<(), Error>
	{
		let configuration = match device.active_configuration() {
			Ok(configuration) => configuration,
			Err(_) => {
				// The device is still unconfigured, so select the (only) configuration it has
				warn!("Inception probe reports as unconfigured, selecting configuration {DEFAULT_CONFIGURATION}");
				device
					.set_configuration(DEFAULT_CONFIGURATION)
					.map_err(|source| Error::Usb {
						operation: "select the device configuration",
						source,
					})?;
				device.active_configuration().map_err(|e| Error::Usb {
					operation: "read the active configuration",
					source: io::Error::other(e),
				})?
			},
		};

		let endpoints: Vec<u8> = configuration
			.interface_alt_settings()
			.filter(|alt| alt.interface_number() == INTERFACE_NUMBER && alt.alternate_setting() == 0)
			.flat_map(|alt| alt.endpoints().map(|endpoint| endpoint.address()).collect::<Vec<_>>())
			.collect();
		trace!("Interface {} endpoints: {:02x?}", INTERFACE_NUMBER, endpoints);

		require_endpoints(&endpoints)
	}

	fn interface(&self) -> io::Result<&Interface>
	{
		self.interface
			.as_ref()
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "USB interface already released"))
	}
}

/// Check that every endpoint the protocol needs is among `endpoints`.
fn require_endpoints(endpoints: &[u8]) -> Result<(), Error>
{
	match Endpoint::REQUIRED
		.into_iter()
		.find(|required| !endpoints.contains(required))
	{
		Some(endpoint) => Err(Error::ConfigurationError {
			endpoint,
		}),
		None => Ok(()),
	}
}

impl OpenTransport for UsbTransport
{
	fn open(config: &ProbeConfig) -> Result<Self, Error>
	{
		let device_info = Self::find_device(config)?;
		debug!(
			"Found Inception probe {}:{} on bus {} address {}",
			config.get_vid(),
			config.get_pid(),
			device_info.bus_number(),
			device_info.device_address()
		);

		let device = device_info.open().map_err(|source| Error::ConnectionRefused {
			vid: config.get_vid(),
			pid: config.get_pid(),
			source: Some(source),
		})?;
		Self::check_endpoints(&device)?;

		let interface = device
			.claim_interface(INTERFACE_NUMBER)
			.map_err(|source| Error::Usb {
				operation: "claim the probe interface",
				source,
			})?;
		trace!("Claimed interface {} of Inception probe", INTERFACE_NUMBER);

		Ok(Self {
			interface: Some(interface),
		})
	}
}

impl Transport for UsbTransport
{
	fn write(&mut self, packet: &[u8], timeout: Duration) -> io::Result<usize>
	{
		let interface = self.interface()?;
		let transfer = async {
			let completion = interface.bulk_out(Endpoint::COMMAND_OUT, packet.to_vec()).await;
			completion.status.map_err(io::Error::other)?;
			Ok::<_, io::Error>(completion.data.actual_length())
		};

		block_on(transfer.or(async {
			Timer::after(timeout).await;
			Err(io::ErrorKind::TimedOut.into())
		}))
	}

	fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> io::Result<usize>
	{
		let interface = self.interface()?;
		let mut queue = interface.bulk_in_queue(Endpoint::RESPONSE_IN);
		queue.submit(RequestBuffer::new(RESPONSE_BUFFER_LENGTH));

		let completion = block_on(async { Some(queue.next_complete().await) }.or(async {
			Timer::after(timeout).await;
			None
		}));
		let Some(completion) = completion else {
			// Reap the cancelled transfer so it can't complete into a later read
			queue.cancel_all();
			let _ = block_on(queue.next_complete());
			return Err(io::ErrorKind::TimedOut.into());
		};
		completion.status.map_err(io::Error::other)?;

		let length = completion.data.len().min(buffer.len());
		buffer[..length].copy_from_slice(&completion.data[..length]);
		Ok(length)
	}

	fn close(&mut self)
	{
		if self.interface.take().is_some() {
			debug!("Released Inception probe interface");
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn all_endpoints_present()
	{
		assert!(require_endpoints(&[0x01, 0x81, 0x82]).is_ok());
		// Order and extra endpoints don't matter
		assert!(require_endpoints(&[0x83, 0x82, 0x81, 0x02, 0x01]).is_ok());
	}

	#[test]
	fn missing_endpoint_is_a_configuration_error()
	{
		assert!(matches!(
			require_endpoints(&[0x01, 0x81]),
			Err(Error::ConfigurationError { endpoint: 0x82 })
		));
		assert!(matches!(
			require_endpoints(&[0x81, 0x82]),
			Err(Error::ConfigurationError { endpoint: 0x01 })
		));
		assert!(matches!(require_endpoints(&[]), Err(Error::ConfigurationError { endpoint: 0x01 })));
	}

	#[test]
	fn ids_print_as_hex()
	{
		assert_eq!(InceptionVidPid::VID.to_string(), "04b4");
		assert_eq!(InceptionVidPid::PID.to_string(), "00f1");
	}
}
