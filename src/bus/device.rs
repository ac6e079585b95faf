//! Bus adapter discovery by USB identifiers

use tracing::{debug, info};

use super::{BusError, Result};

/// USB `(vendor, product)` pairs tried when looking for a bus adapter.
///
/// These are common USB-serial chips and Arduino boards, not a list of
/// certified adapters. Pass other candidates straight to the transport when
/// an adapter is missing here.
pub const KNOWN_DEVICES: &[(u16, u16)] = &[
    // Arduino Uno
    (0x2341, 0x0043),
    // Arduino Mega 2560
    (0x2341, 0x0042),
    // CH340 USB serial
    (0x1A86, 0x7523),
    // FTDI FT232R
    (0x0403, 0x6001),
];

/// A candidate device as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Platform path or name (`/dev/ttyUSB0`, `COM3`, ...)
    pub name: String,
    /// USB vendor id
    pub vid: u16,
    /// USB product id
    pub pid: u16,
}

impl DeviceInfo {
    /// Whether this device appears in [`KNOWN_DEVICES`].
    #[must_use]
    pub fn is_known(&self) -> bool {
        KNOWN_DEVICES.contains(&(self.vid, self.pid))
    }
}

/// First candidate with a known identifier pair.
pub fn select_device(candidates: &[DeviceInfo]) -> Result<&DeviceInfo> {
    candidates
        .iter()
        .inspect(|dev| debug!(name = %dev.name, vid = dev.vid, pid = dev.pid, "candidate device"))
        .find(|dev| dev.is_known())
        .ok_or(BusError::DeviceNotFound)
}

/// Open the first known candidate with `open`.
pub fn open_first<T, F>(candidates: &[DeviceInfo], open: F) -> Result<T>
where
    F: FnOnce(&DeviceInfo) -> std::io::Result<T>,
{
    let device = select_device(candidates)?;
    info!(name = %device.name, "connecting to conductor");
    open(device).map_err(|err| BusError::Protocol(err.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, vid: u16, pid: u16) -> DeviceInfo {
        DeviceInfo {
            name: name.to_owned(),
            vid,
            pid,
        }
    }

    #[test]
    fn test_selects_first_known() {
        let candidates = [
            device("/dev/ttyS0", 0x0000, 0x0000),
            device("/dev/ttyUSB0", 0x1A86, 0x7523),
            device("/dev/ttyACM0", 0x2341, 0x0043),
        ];

        assert_eq!(select_device(&candidates).unwrap().name, "/dev/ttyUSB0");
    }

    #[test]
    fn test_not_found() {
        let candidates = [device("/dev/ttyS0", 0x1234, 0x5678)];

        assert!(matches!(select_device(&candidates), Err(BusError::DeviceNotFound)));
        assert!(matches!(
            open_first(&candidates, |_| Ok(())),
            Err(BusError::DeviceNotFound)
        ));
    }

    #[test]
    fn test_open_first_passes_device() {
        let candidates = [device("COM3", 0x0403, 0x6001)];
        let opened = open_first(&candidates, |dev| Ok(dev.name.clone())).unwrap();

        assert_eq!(opened, "COM3");
    }
}
