//! Track chunk decoding
//!
//! A track is kept as its raw bytes and decoded on every iteration, so the
//! same track can be walked any number of times.

use std::iter::FusedIterator;

use bytes::Bytes;

use super::event::{ChannelEvent, ChannelMessage, MetaEvent, SysEx, TimedEvent, TrackEvent};
use super::{Result, ScoreError, vlq};

/// Track chunk tag
pub const TRACK_MAGIC: [u8; 4] = *b"MTrk";

const STATUS_SYSEX: u8 = 0xF0;
const STATUS_SYSEX_ESCAPE: u8 = 0xF7;
const STATUS_META: u8 = 0xFF;

/// One track chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    index: usize,
    data: Bytes,
}

impl Track {
    /// Wrap the body of the `index`th track chunk
    #[must_use]
    pub fn new(index: usize, data: Bytes) -> Self {
        Self { index, data }
    }

    /// Position of this track in its file
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Raw chunk body
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Decode the events from the start of the track.
    ///
    /// The end-of-track event is the last item yielded. Anything after it is
    /// ignored.
    #[must_use]
    pub fn events(&self) -> TrackEvents {
        TrackEvents {
            track: self.index,
            data: self.data.clone(),
            pos: 0,
            tick: 0,
            running_status: None,
            done: false,
        }
    }

    /// Decode every event, failing on the first fault.
    pub fn collect_events(&self) -> Result<Vec<TimedEvent>> {
        self.events().collect()
    }
}

impl IntoIterator for &Track {
    type Item = Result<TimedEvent>;
    type IntoIter = TrackEvents;

    fn into_iter(self) -> Self::IntoIter {
        self.events()
    }
}

/// Iterator over the events of a [`Track`]
#[derive(Debug, Clone)]
pub struct TrackEvents {
    track: usize,
    data: Bytes,
    pos: usize,
    tick: u64,
    running_status: Option<u8>,
    done: bool,
}

impl TrackEvents {
    fn next_event(&mut self) -> Result<TimedEvent> {
        if self.pos >= self.data.len() {
            return Err(ScoreError::MissingEndOfTrack { track: self.track });
        }

        let (delta, read) = vlq::read(&self.data, self.pos)?;
        self.pos += read;
        self.tick += u64::from(delta);

        let lead = self.byte(self.pos)?;
        let event = if lead & 0x80 == 0 {
            self.running_event()?
        } else {
            self.pos += 1;
            self.status_event(lead)?
        };

        Ok(TimedEvent {
            tick: self.tick,
            event,
        })
    }

    /// Data byte first: reuse the last channel status.
    fn running_event(&mut self) -> Result<TrackEvent> {
        let status = self
            .running_status
            .ok_or(ScoreError::RunningStatusWithoutStatus { offset: self.pos })?;
        self.channel_event(status)
    }

    fn status_event(&mut self, status: u8) -> Result<TrackEvent> {
        match status {
            STATUS_META => {
                self.running_status = None;
                let kind = self.byte(self.pos)?;
                self.pos += 1;
                let data = self.length_prefixed()?;
                Ok(TrackEvent::Meta(MetaEvent::decode(kind, data)?))
            }
            STATUS_SYSEX | STATUS_SYSEX_ESCAPE => {
                self.running_status = None;
                let data = self.length_prefixed()?;
                Ok(TrackEvent::SysEx(SysEx {
                    start: status == STATUS_SYSEX,
                    data,
                }))
            }
            0xF1..=0xFE => Err(ScoreError::UnsupportedStatus {
                status,
                offset: self.pos - 1,
            }),
            _ => {
                self.running_status = Some(status);
                self.channel_event(status)
            }
        }
    }

    fn channel_event(&mut self, status: u8) -> Result<TrackEvent> {
        let offset = self.pos - 1;
        let len = ChannelMessage::data_len(status)
            .ok_or(ScoreError::UnsupportedStatus { status, offset })?;
        let start = self.pos;
        let data = self.take(len)?;
        if let Some(at) = data.iter().position(|&byte| byte & 0x80 != 0) {
            return Err(ScoreError::InvalidDataByte {
                byte: data[at],
                offset: start + at,
            });
        }
        let message = ChannelMessage::from_parts(status, &data)
            .ok_or(ScoreError::UnsupportedStatus { status, offset })?;

        Ok(TrackEvent::Channel(ChannelEvent {
            channel: status & 0x0F,
            message,
        }))
    }

    fn length_prefixed(&mut self) -> Result<Bytes> {
        let (len, read) = vlq::read(&self.data, self.pos)?;
        self.pos += read;
        self.take(len as usize)
    }

    fn take(&mut self, len: usize) -> Result<Bytes> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(ScoreError::UnexpectedEof {
                offset: self.data.len(),
            });
        }
        let bytes = self.data.slice(self.pos..end);
        self.pos = end;
        Ok(bytes)
    }

    fn byte(&self, at: usize) -> Result<u8> {
        self.data
            .get(at)
            .copied()
            .ok_or(ScoreError::UnexpectedEof { offset: at })
    }
}

impl Iterator for TrackEvents {
    type Item = Result<TimedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.next_event();
        self.done = match &result {
            Ok(timed) => timed.event.is_end_of_track(),
            Err(_) => true,
        };
        Some(result)
    }
}

impl FusedIterator for TrackEvents {}
