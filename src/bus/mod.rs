//! G6 bus master
//!
//! The [`Master`] owns the transport behind a [`Link`], which serialises every
//! write and write-then-read span. [`Node`] handles share the link and encode
//! the instrument command set.

mod config;
mod device;
mod error;
mod link;
mod master;
mod node;

pub use config::BusConfig;
pub use device::{DeviceInfo, KNOWN_DEVICES, open_first, select_device};
pub use error::{BusError, Result};
pub use link::Link;
pub use master::Master;
pub use node::{Node, NodeInfo};
