//! Bus ownership, reset and enumeration

use std::sync::Arc;
use std::thread;

use tracing::{debug, info, instrument, warn};

use super::{BusConfig, BusError, Link, Node, Result};
use crate::protocol::{
    Command, FIRST_NODE_ADDRESS, LAST_NODE_ADDRESS, NODE_BROADCAST, Opcode, PacketIn, PacketOut,
    RESET_CHECK,
};
use crate::transport::Transport;

/// Reset pulses sent before enumerating.
const ENUMERATION_RESET_PULSES: u32 = 5;

/// Reset pulses sent when restarting a faulted enumeration.
const RESTART_RESET_PULSES: u32 = 2;

/// The single master of a G6 bus.
///
/// Owns the transport and the nodes discovered on it. Nodes are ordered by
/// address and live only as long as the master.
#[derive(Debug)]
pub struct Master<T> {
    link: Arc<Link<T>>,
    nodes: Vec<Node<T>>,
}

impl<T: Transport> Master<T> {
    /// Take ownership of a transport. No traffic is sent until [`Master::reset`]
    /// or [`Master::enumerate_bus`].
    pub fn new(transport: T, config: BusConfig) -> Result<Self> {
        Ok(Self {
            link: Arc::new(Link::new(transport, config)?),
            nodes: Vec::new(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        self.link.config()
    }

    /// Shared bus access.
    #[must_use]
    pub fn link(&self) -> &Arc<Link<T>> {
        &self.link
    }

    /// Discovered nodes in address order.
    #[must_use]
    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    /// Mutable access to the discovered nodes.
    pub fn nodes_mut(&mut self) -> &mut [Node<T>] {
        &mut self.nodes
    }

    /// Node holding `address`, if discovered.
    #[must_use]
    pub fn node(&self, address: u8) -> Option<&Node<T>> {
        self.nodes.iter().find(|node| node.address() == address)
    }

    /// Mutable node holding `address`, if discovered.
    pub fn node_mut(&mut self, address: u8) -> Option<&mut Node<T>> {
        self.nodes.iter_mut().find(|node| node.address() == address)
    }

    /// Write a frame and wait for its reply.
    pub fn exchange(&self, frame: &[u8]) -> Result<PacketIn> {
        self.link.exchange(frame)
    }

    /// Write a frame without waiting for a reply.
    pub fn write(&self, frame: &[u8]) -> Result<()> {
        self.link.write(frame)
    }

    /// Forget every node and broadcast `pulses` resets, then let the bus settle.
    #[instrument(level = "debug", skip(self))]
    pub fn reset(&mut self, pulses: u32) -> Result<()> {
        self.nodes.clear();

        let frame = PacketOut::single(NODE_BROADCAST, Command::new(Opcode::Reset, vec![RESET_CHECK]))
            .to_bytes()?;
        let config = self.link.config();
        for _ in 0..pulses {
            self.link.write(&frame)?;
            thread::sleep(config.reset_pulse_delay);
        }
        thread::sleep(config.post_reset_delay);
        Ok(())
    }

    /// [`Master::enumerate_bus`] with the configured restart budget.
    pub fn enumerate(&mut self) -> Result<&[Node<T>]> {
        let restarts = self.link.config().enumeration_restarts;
        self.enumerate_bus(restarts)
    }

    /// Reset the bus and hand out addresses until no node answers.
    ///
    /// Silence after an address broadcast ends discovery. A faulted reply
    /// restarts discovery from address 1, at most `max_restarts` times. Every
    /// discovered node is then queried for its info and latency.
    ///
    /// # Errors
    ///
    /// [`BusError::EnumerationAborted`] when bus faults outlast the restart
    /// budget, [`BusError::NodeUnresponsive`] when a node fails every info
    /// attempt. Local transport failures propagate as they occur.
    #[instrument(level = "info", skip(self))]
    pub fn enumerate_bus(&mut self, max_restarts: u32) -> Result<&[Node<T>]> {
        self.reset(ENUMERATION_RESET_PULSES)?;

        info!("enumerating bus");
        let mut restarts = 0;
        let mut next = FIRST_NODE_ADDRESS;
        loop {
            match self.assign_address(next) {
                Ok(()) => {
                    debug!(address = next, "node answered address assignment");
                    self.nodes.push(Node::new(Arc::clone(&self.link), next));
                    if next == LAST_NODE_ADDRESS {
                        warn!("every assignable address taken, stopping enumeration");
                        break;
                    }
                    next += 1;
                }
                Err(err) if err.is_timeout() => {
                    info!("enumeration done");
                    break;
                }
                Err(err) if err.is_retryable() => {
                    if restarts == max_restarts {
                        warn!(restarts, error = %err, "enumeration aborted");
                        self.nodes.clear();
                        return Err(BusError::EnumerationAborted { restarts });
                    }
                    restarts += 1;
                    warn!(restarts, error = %err, "restarting bus enumeration");
                    self.reset(RESTART_RESET_PULSES)?;
                    self.link.discard_input()?;
                    next = FIRST_NODE_ADDRESS;
                }
                Err(err) => return Err(err),
            }
        }

        let count = self.nodes.len();
        info!(count, "found {count} device{}", if count == 1 { "" } else { "s" });

        let attempts = self.link.config().info_attempts;
        for node in &mut self.nodes {
            node.probe(attempts)?;
            info!(address = node.address(), "{node}");
        }
        Ok(&self.nodes)
    }

    fn assign_address(&self, address: u8) -> Result<()> {
        let frame = PacketOut::single(NODE_BROADCAST, Command::new(Opcode::AssignAddress, vec![address]))
            .to_bytes()?;
        let config = self.link.config();

        self.link.with_lock(|bus| {
            bus.write(&frame)?;
            thread::sleep(config.assign_settle_delay);
            let reply = bus.read_reply(config.enumeration_timeout)?;
            if reply.is_ok() {
                Ok(())
            } else if reply.is_checksum_fault() {
                Err(BusError::ChecksumFault)
            } else {
                Err(BusError::StatusNack {
                    status: reply.status_byte(),
                })
            }
        })
    }
}
