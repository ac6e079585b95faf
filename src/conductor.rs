//! Driving nodes from a mixed score
//!
//! Tracks are matched to nodes by name, then each mixed event is sent to its
//! node once its timestamp, less the node's offset, comes due.

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::bus::{Node, Result};
use crate::score::{ChannelMessage, MixedEvent, Mixer, Roster, TrackEvent};
use crate::transport::Transport;

/// Light level for a sounding note
const LIGHT_ON: u8 = 255;
/// Light level for a released note
const LIGHT_OFF: u8 = 0;

/// Track index to node address
pub type TrackMapping = BTreeMap<usize, u8>;

/// Send the commands a mixed event calls for.
///
/// Note on lights the key and triggers it. Note off, or note on with zero
/// velocity, dims the key and releases it. Other events send nothing.
/// Returns whether anything was sent.
pub fn dispatch<T: Transport>(node: &mut Node<T>, event: &MixedEvent) -> Result<bool> {
    let TrackEvent::Channel(channel_event) = &event.event else {
        return Ok(false);
    };
    let time = u32::try_from(event.timestamp_ms).unwrap_or(u32::MAX);
    let channel = channel_event.channel;

    match channel_event.message {
        ChannelMessage::NoteOn { key, velocity } if velocity > 0 => {
            debug!(address = node.address(), channel, key, "note down");
            node.light(time, channel, key, LIGHT_ON)?;
            node.note_down(time, channel, key, velocity)?;
        }
        ChannelMessage::NoteOn { key, velocity } | ChannelMessage::NoteOff { key, velocity } => {
            debug!(address = node.address(), channel, key, "note up");
            node.light(time, channel, key, LIGHT_OFF)?;
            node.note_up(time, channel, key, velocity)?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Match each named track to the node whose instrument name equals it.
///
/// Unnamed and unmatched tracks are left out.
pub fn assign_tracks<T: Transport>(roster: &Roster, nodes: &[Node<T>]) -> TrackMapping {
    let mut mapping = TrackMapping::new();
    for summary in roster.tracks() {
        let Some(name) = summary.name.as_deref() else {
            warn!(track = summary.index, "unnamed track left unassigned");
            continue;
        };
        match nodes.iter().find(|node| node.name() == name) {
            Some(node) => {
                info!(track = summary.index, name, address = node.address(), "track assigned");
                mapping.insert(summary.index, node.address());
            }
            None => warn!(track = summary.index, name, "no node for track"),
        }
    }
    mapping
}

/// Play `mixer` on `nodes`, in order, sleeping until each event is due.
///
/// An event is due at its timestamp less its node's offset. Events of
/// unmapped tracks are skipped. Returns the number of events dispatched.
#[instrument(level = "info", skip_all)]
pub fn perform<T: Transport>(
    mixer: Mixer,
    mapping: &TrackMapping,
    nodes: &mut [Node<T>],
) -> Result<usize> {
    let start = Instant::now();
    let mut dispatched = 0;

    for event in mixer {
        let Some(&address) = mapping.get(&event.track) else {
            continue;
        };
        let Some(node) = nodes.iter_mut().find(|node| node.address() == address) else {
            continue;
        };

        let due_us = i128::from(event.timestamp_ms) * 1_000 - i128::from(node.offset_us());
        let elapsed_us = i128::try_from(start.elapsed().as_micros()).unwrap_or(i128::MAX);
        if due_us > elapsed_us {
            let wait = u64::try_from(due_us - elapsed_us).unwrap_or(u64::MAX);
            thread::sleep(Duration::from_micros(wait));
        }

        if dispatch(node, &event)? {
            dispatched += 1;
        }
    }

    info!(dispatched, "performance finished");
    Ok(dispatched)
}
