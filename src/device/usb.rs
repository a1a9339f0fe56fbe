//! The iMON LCD driven directly over libusb.
//!
//! The kernel's iMON driver re-frames anything written to its LCD node as
//! screen text, so it is detached and interface 0 is claimed instead.

use super::protocol::PACKET_LEN;
use super::transport::PacketEndpoint;
use crate::error::{Error, Result};
use log::{debug, info, warn};
use rusb::{DeviceHandle, GlobalContext};
use std::time::Duration;

pub const IMON_VENDOR: u16 = 0x15c2;
pub const IMON_PRODUCT: u16 = 0xffdc;

const ENDPOINT_DIR_MASK: u8 = 0x80;

pub struct ImonLcd {
    handle: DeviceHandle<GlobalContext>,
    interface: u8,
    endpoint: u8,
    reattach: bool,
}

impl ImonLcd {
    pub fn open() -> Result<Self> {
        Self::open_with_ids(IMON_VENDOR, IMON_PRODUCT)
    }

    /// Open the first device with the given ids and claim its display interface.
    pub fn open_with_ids(vendor: u16, product: u16) -> Result<Self> {
        let mut handle = rusb::open_device_with_vid_pid(vendor, product).ok_or_else(|| {
            Error::Device(format!("No display {:04x}:{:04x} found", vendor, product))
        })?;

        // The first interface and alternate setting carry the display
        let config = handle.device().active_config_descriptor()?;
        let descriptor = config
            .interfaces()
            .next()
            .and_then(|interface| interface.descriptors().next())
            .ok_or_else(|| Error::Device("Display has no interfaces".to_string()))?;
        let interface = descriptor.interface_number();
        let endpoint = out_endpoint(descriptor.endpoint_descriptors().map(|ep| ep.address()))
            .ok_or_else(|| Error::Device("Display has no OUT endpoint".to_string()))?;

        let reattach = match handle.kernel_driver_active(interface) {
            Ok(true) => {
                handle.detach_kernel_driver(interface)?;
                debug!("Detached kernel driver from interface {}", interface);
                true
            }
            Ok(false) | Err(rusb::Error::NotSupported) => false,
            Err(e) => return Err(e.into()),
        };
        handle.claim_interface(interface)?;

        info!(
            "Opened display {:04x}:{:04x}, interface {}, endpoint {:#04x}",
            vendor, product, interface, endpoint
        );
        Ok(Self {
            handle,
            interface,
            endpoint,
            reattach,
        })
    }
}

impl PacketEndpoint for ImonLcd {
    fn write_packet(&mut self, packet: &[u8; PACKET_LEN], timeout: Duration) -> Result<()> {
        match self.handle.write_interrupt(self.endpoint, packet, timeout) {
            Ok(PACKET_LEN) => Ok(()),
            Ok(n) => Err(Error::Device(format!(
                "Short transfer: {} of {} bytes",
                n, PACKET_LEN
            ))),
            Err(e) => Err(transfer_error(e, timeout)),
        }
    }
}

impl Drop for ImonLcd {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            warn!("Failed to release interface {}: {}", self.interface, e);
        }
        if self.reattach {
            if let Err(e) = self.handle.attach_kernel_driver(self.interface) {
                debug!("Kernel driver not reattached: {}", e);
            }
        }
    }
}

/// First host-to-device endpoint address.
fn out_endpoint(addresses: impl IntoIterator<Item = u8>) -> Option<u8> {
    addresses
        .into_iter()
        .find(|address| address & ENDPOINT_DIR_MASK == 0)
}

fn transfer_error(err: rusb::Error, timeout: Duration) -> Error {
    match err {
        rusb::Error::Timeout => Error::Timeout(timeout),
        other => Error::Usb(other),
    }
}
