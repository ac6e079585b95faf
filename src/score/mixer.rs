//! Merging tracks into one timed stream
//!
//! Tracks are merged on absolute ticks according to the file format, then
//! ticks are converted to milliseconds as the stream is consumed. Tempo
//! changes apply from their own tick onwards.

use std::iter::FusedIterator;
use std::vec;

use tracing::warn;

use super::{Division, Format, Result, Score, ScoreError, TrackEvent};

/// Tempo assumed until the first tempo event: 120 beats per minute
pub const DEFAULT_TEMPO_US: u32 = 500_000;

const MICROS_PER_SECOND: u128 = 1_000_000;
const MICROS_PER_MILLI: u128 = 1_000;

/// Event placed on the merged timeline
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MixedEvent {
    /// Milliseconds since the start of the score
    pub timestamp_ms: u64,
    /// Absolute tick on the merged timeline
    pub ticks: u64,
    /// Index of the track the event came from
    pub track: usize,
    /// The event
    pub event: TrackEvent,
}

#[derive(Debug, Clone)]
struct Merged {
    ticks: u64,
    track: usize,
    event: TrackEvent,
}

/// Single pass over the merged, rebased events of a score.
///
/// Timestamps never decrease. Walking the score again needs a new mixer.
#[derive(Debug)]
pub struct Mixer {
    events: vec::IntoIter<Merged>,
    clock: TempoClock,
}

impl Mixer {
    /// Merge the tracks of `score` as its format prescribes.
    ///
    /// # Errors
    ///
    /// [`ScoreError::EmptyFormat0`] for a single-track score without a
    /// track, or the first fault met while decoding a track.
    pub fn new(score: &Score) -> Result<Self> {
        let header = score.header();
        let tracks = score.tracks();

        let events = match header.format {
            Format::SingleTrack => {
                let track = tracks.first().ok_or(ScoreError::EmptyFormat0)?;
                if tracks.len() > 1 {
                    warn!(tracks = tracks.len(), "format 0 score with extra tracks, using the first");
                }
                absolute(track.index(), track.collect_events()?, 0)
            }
            Format::Simultaneous => {
                let mut merged = Vec::new();
                for track in tracks {
                    merged.extend(absolute(track.index(), track.collect_events()?, 0));
                }
                merged.sort_by_key(|event| event.ticks);
                merged
            }
            Format::Sequential => {
                let mut merged: Vec<Merged> = Vec::new();
                for track in tracks {
                    let offset = merged.last().map_or(0, |event| event.ticks);
                    merged.extend(absolute(track.index(), track.collect_events()?, offset));
                }
                merged
            }
        };

        Ok(Self {
            events: events.into_iter(),
            clock: TempoClock::new(header.division),
        })
    }

    /// Events not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

fn absolute(track: usize, events: Vec<super::TimedEvent>, offset: u64) -> Vec<Merged> {
    events
        .into_iter()
        .map(|timed| Merged {
            ticks: timed.tick + offset,
            track,
            event: timed.event,
        })
        .collect()
}

impl Iterator for Mixer {
    type Item = MixedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let Merged {
            ticks,
            track,
            event,
        } = self.events.next()?;

        let timestamp_ms = self.clock.millis_at(ticks);
        if let Some(tempo) = event.tempo() {
            self.clock.set_tempo(ticks, tempo);
        }

        Some(MixedEvent {
            timestamp_ms,
            ticks,
            track,
            event,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.events.size_hint()
    }
}

impl ExactSizeIterator for Mixer {}

impl FusedIterator for Mixer {}

/// Piecewise tick to wall-time conversion.
///
/// Each tempo change anchors the elapsed time at its tick, so earlier
/// timestamps never move.
#[derive(Debug, Clone)]
pub(crate) struct TempoClock {
    division: Division,
    tempo_us: u32,
    anchor_tick: u64,
    anchor_us: u128,
}

impl TempoClock {
    pub(crate) fn new(division: Division) -> Self {
        Self {
            division,
            tempo_us: DEFAULT_TEMPO_US,
            anchor_tick: 0,
            anchor_us: 0,
        }
    }

    pub(crate) fn micros_at(&self, ticks: u64) -> u128 {
        match self.division {
            Division::TicksPerQuarter(tpqn) => {
                let since = u128::from(ticks.saturating_sub(self.anchor_tick));
                self.anchor_us + since * u128::from(self.tempo_us) / u128::from(tpqn)
            }
            Division::Smpte {
                fps,
                ticks_per_frame,
            } => {
                let per_second = u128::from(fps) * u128::from(ticks_per_frame);
                u128::from(ticks) * MICROS_PER_SECOND / per_second
            }
        }
    }

    pub(crate) fn millis_at(&self, ticks: u64) -> u64 {
        u64::try_from(self.micros_at(ticks) / MICROS_PER_MILLI).unwrap_or(u64::MAX)
    }

    pub(crate) fn set_tempo(&mut self, ticks: u64, tempo_us: u32) {
        self.anchor_us = self.micros_at(ticks);
        self.anchor_tick = ticks;
        self.tempo_us = tempo_us;
    }
}
