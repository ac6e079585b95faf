use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use g6::bus::{BusConfig, BusError, Master};
use g6::protocol::features::{TAG_END, TAG_LIGHT_CHANNEL, TAG_NOTE_CHANNEL, TAG_OFFSET};
use g6::protocol::{
    Command, NODE_BROADCAST, Opcode, PacketOut, Report, Status, checksum, serialize_reply, unescape,
};
use g6::transport::Transport;

/// Instrument firmware as seen from the bus.
#[derive(Debug, Clone)]
struct SimNode {
    ident: &'static str,
    descriptor: Vec<u8>,
    address: Option<u8>,
    counter: u32,
}

impl SimNode {
    fn new(ident: &'static str, descriptor: &[u8]) -> Self {
        Self {
            ident,
            descriptor: descriptor.to_vec(),
            address: None,
            counter: 0,
        }
    }

    fn reply(&mut self, op: u8, payload: &[u8]) -> Option<(u8, Vec<u8>)> {
        let ok = Report::Ok.as_u8();
        let reported = |data: &[u8]| {
            let mut body = vec![ok];
            body.extend_from_slice(data);
            Some((Status::Ok.as_u8(), body))
        };

        match Opcode::from_u8(op) {
            Some(Opcode::ReadId) => reported(self.ident.as_bytes()),
            Some(Opcode::GetCmdVersion) => reported(&[0x13]),
            Some(Opcode::GetProtocolVersion) => reported(&[0x10]),
            Some(Opcode::GetCommVersion) => reported(&[0x11]),
            Some(Opcode::GetFeatures) => reported(&self.descriptor),
            Some(Opcode::Ping) => Some((Status::Ok.as_u8(), Vec::new())),
            Some(Opcode::Control) if payload.len() == 7 => reported(&[]),
            Some(Opcode::Control) => Some((Status::Ok.as_u8(), vec![Report::ParamNoData.as_u8()])),
            Some(Opcode::Increment) => {
                self.counter += 1;
                None
            }
            Some(Opcode::NoteDown | Opcode::NoteUp | Opcode::Light | Opcode::Counter) => None,
            _ => Some((Status::UnknownCommand.as_u8(), Vec::new())),
        }
    }
}

/// Chain of simulated nodes behind one transport.
#[derive(Debug, Default)]
struct SimBus {
    nodes: Vec<SimNode>,
    input: VecDeque<u8>,
    writes: usize,
    /// Replies to answer with a checksum-error status
    nack_replies: u32,
    /// Replies to send with a corrupted checksum
    corrupt_replies: u32,
}

impl SimBus {
    fn with_nodes(nodes: Vec<SimNode>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    fn respond(&mut self, status: u8, data: &[u8]) {
        let mut status = status;
        if self.nack_replies > 0 {
            self.nack_replies -= 1;
            status = Status::ChecksumError.as_u8();
        }
        let mut wire = serialize_reply(status, data).unwrap();
        if self.corrupt_replies > 0 {
            self.corrupt_replies -= 1;
            let last = wire.len() - 1;
            wire[last] = wire[last].wrapping_add(1);
        }
        self.input.extend(wire);
    }

    fn handle(&mut self, body: &[u8]) {
        let (sum, rest) = body.split_last().unwrap();
        assert_eq!(*sum, checksum(rest), "master sent a bad checksum");
        let (dst, len, op, payload) = (rest[0], rest[1], rest[2], &rest[3..]);
        assert_eq!(usize::from(len), rest.len());

        if dst == NODE_BROADCAST {
            match Opcode::from_u8(op) {
                Some(Opcode::Reset) => {
                    for node in &mut self.nodes {
                        node.address = None;
                    }
                }
                Some(Opcode::AssignAddress) => {
                    // First node still unaddressed takes it, the rest stay downstream
                    let Some(node) = self.nodes.iter_mut().find(|n| n.address.is_none()) else {
                        return;
                    };
                    node.address = Some(payload[0]);
                    self.respond(Status::Ok.as_u8(), &[]);
                }
                _ => {}
            }
            return;
        }

        let reply = self
            .nodes
            .iter_mut()
            .find(|n| n.address == Some(dst))
            .and_then(|node| node.reply(op, payload));
        if let Some((status, data)) = reply {
            self.respond(status, &data);
        }
    }
}

impl Transport for SimBus {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writes += 1;
        let body = unescape(bytes);
        self.handle(&body);
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Duration) -> io::Result<u8> {
        self.input
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "bus idle"))
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.input.clear();
        Ok(())
    }
}

fn glock() -> SimNode {
    SimNode::new(
        "GlockOBot;2.1",
        &[TAG_NOTE_CHANNEL, 0, 76, 108, TAG_LIGHT_CHANNEL, 0, 0, 32, TAG_OFFSET, 0x00, 0x32, 0, TAG_END],
    )
}

fn tambourine() -> SimNode {
    SimNode::new("Tambourine;1.0", &[TAG_NOTE_CHANNEL, 0, 60, 60, TAG_END])
}

fn steppers() -> SimNode {
    SimNode::new("Musical Steppers;0.9", &[TAG_NOTE_CHANNEL, 1, 36, 72, TAG_END])
}

fn master(bus: SimBus) -> Master<SimBus> {
    Master::new(bus, BusConfig::immediate()).unwrap()
}

#[test]
fn enumeration_assigns_addresses_in_chain_order() {
    let mut master = master(SimBus::with_nodes(vec![glock(), tambourine(), steppers()]));

    let nodes = master.enumerate().unwrap();
    let addresses: Vec<u8> = nodes.iter().map(|n| n.address()).collect();
    let names: Vec<&str> = nodes.iter().map(|n| n.name()).collect();

    assert_eq!(addresses, vec![1, 2, 3]);
    assert_eq!(names, vec!["GlockOBot", "Tambourine", "Musical Steppers"]);
}

#[test]
fn enumeration_collects_node_info() {
    let mut master = master(SimBus::with_nodes(vec![glock()]));
    master.enumerate().unwrap();

    let node = master.node(1).unwrap();
    assert_eq!(node.firmware_version(), Some("2.1"));
    assert_eq!(node.info().cmd_version.to_string(), "1.3");
    assert_eq!(node.requested_offset_ms(), 50);
    assert_eq!(node.channels().unwrap().get(&0), Some(&(76, 108)));
    assert_eq!(node.light_channels().unwrap().get(&0), Some(&(0, 32)));
    assert!(node.offset_us() >= 50_000);
}

#[test]
fn empty_chain_finds_nothing() {
    let mut master = master(SimBus::default());

    assert!(master.enumerate().unwrap().is_empty());
}

#[test]
fn enumeration_restarts_after_fault() {
    let mut bus = SimBus::with_nodes(vec![glock(), tambourine()]);
    bus.corrupt_replies = 1;
    let mut master = master(bus);

    let nodes = master.enumerate().unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[1].address(), 2);
}

#[test]
fn enumeration_gives_up_after_restart_budget() {
    let mut bus = SimBus::with_nodes(vec![glock()]);
    bus.nack_replies = u32::MAX;
    let mut master = master(bus);

    let err = master.enumerate_bus(3).unwrap_err();
    assert!(matches!(err, BusError::EnumerationAborted { restarts: 3 }));
    assert!(master.nodes().is_empty());
}

#[test]
fn resend_budget_bounds_writes() {
    let config = BusConfig {
        resend_retries: 4,
        ..BusConfig::immediate()
    };
    let mut master = Master::new(SimBus::with_nodes(vec![glock()]), config).unwrap();
    master.enumerate().unwrap();

    master.link().with_transport(|bus| {
        bus.nack_replies = u32::MAX;
        bus.writes = 0;
    });
    let frame = PacketOut::single(1, Command::bare(Opcode::Ping)).to_bytes().unwrap();
    let err = master.exchange(&frame).unwrap_err();

    assert!(matches!(err, BusError::ResendExhausted { resends: 4 }));
    master.link().with_transport(|bus| assert_eq!(bus.writes, 5));
}

#[test]
fn transient_checksum_fault_is_resent() {
    let mut master = master(SimBus::with_nodes(vec![tambourine()]));
    master.enumerate().unwrap();
    master.link().with_transport(|bus| bus.corrupt_replies = 2);

    let node = master.node_mut(1).unwrap();
    assert!(node.ping().unwrap().is_ok());
}

#[test]
fn unknown_command_is_not_resent() {
    let mut master = master(SimBus::with_nodes(vec![tambourine()]));
    master.enumerate().unwrap();
    master.link().with_transport(|bus| bus.writes = 0);

    let frame = PacketOut::single(1, Command::raw(0x55, vec![])).to_bytes().unwrap();
    let err = master.exchange(&frame).unwrap_err();

    assert!(matches!(err, BusError::StatusNack { status: 0x02 }));
    master.link().with_transport(|bus| assert_eq!(bus.writes, 1));
}

#[test]
fn control_report_nack() {
    let mut master = master(SimBus::with_nodes(vec![steppers()]));
    master.enumerate().unwrap();
    let node = master.node_mut(1).unwrap();

    node.control(0, 1, 7, 100).unwrap();
    let err = node
        .exchange_one(Command::new(Opcode::Control, vec![1, 2]))
        .unwrap_err();
    assert!(matches!(err, BusError::ReportNack { report: 0x02 }));
}

#[test]
fn diagnostic_counter_is_fire_and_forget() {
    let mut master = master(SimBus::with_nodes(vec![glock()]));
    master.enumerate().unwrap();

    let node = master.node_mut(1).unwrap();
    node.increment_counter().unwrap();
    node.resend().unwrap();
    node.show_counter().unwrap();

    master
        .link()
        .with_transport(|bus| assert_eq!(bus.nodes[0].counter, 2));
}

#[test]
fn concurrent_exchanges_never_cross() {
    let mut master = master(SimBus::with_nodes(vec![glock(), tambourine(), steppers()]));
    master.enumerate().unwrap();
    let expected: Vec<(u8, String)> = master
        .nodes()
        .iter()
        .map(|n| (n.address(), n.info().ident.clone()))
        .collect();

    let link = Arc::clone(master.link());
    let failures = Arc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = expected
        .into_iter()
        .map(|(address, ident)| {
            let link = Arc::clone(&link);
            let failures = Arc::clone(&failures);
            thread::spawn(move || {
                let frame = PacketOut::single(address, Command::bare(Opcode::ReadId))
                    .to_bytes()
                    .unwrap();
                for _ in 0..50 {
                    let reply = link.exchange(&frame).unwrap();
                    if &reply.data()[1..] != ident.as_bytes() {
                        failures.lock().unwrap().push(address);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(failures.lock().unwrap().is_empty());
}

#[test]
fn reset_forgets_nodes() {
    let mut master = master(SimBus::with_nodes(vec![glock(), tambourine()]));
    master.enumerate().unwrap();

    master.reset(1).unwrap();
    assert!(master.nodes().is_empty());
    master
        .link()
        .with_transport(|bus| assert!(bus.nodes.iter().all(|n| n.address.is_none())));
}
