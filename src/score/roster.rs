//! Per-track summary used to match tracks to instruments

use std::collections::BTreeMap;
use std::fmt;

use super::{ChannelMessage, MetaEvent, Result, Score, TrackEvent};

/// General MIDI program names, indexed by program number
pub const PROGRAM_NAMES: [&str; 128] = [
    "Acoustic grand piano",
    "Bright acoustic piano",
    "Electric grand piano",
    "Honky tonk piano",
    "Electric piano 1",
    "Electric piano 2",
    "Harpsichord",
    "Clavinet",
    "Celesta",
    "Glockenspiel",
    "Music box",
    "Vibraphone",
    "Marimba",
    "Xylophone",
    "Tubular bell",
    "Dulcimer",
    "Hammond / drawbar organ",
    "Percussive organ",
    "Rock organ",
    "Church organ",
    "Reed organ",
    "Accordion",
    "Harmonica",
    "Tango accordion",
    "Nylon string acoustic guitar",
    "Steel string acoustic guitar",
    "Jazz electric guitar",
    "Clean electric guitar",
    "Muted electric guitar",
    "Overdriven guitar",
    "Distortion guitar",
    "Guitar harmonics",
    "Acoustic bass",
    "Fingered electric bass",
    "Picked electric bass",
    "Fretless bass",
    "Slap bass 1",
    "Slap bass 2",
    "Synth bass 1",
    "Synth bass 2",
    "Violin",
    "Viola",
    "Cello",
    "Contrabass",
    "Tremolo strings",
    "Pizzicato strings",
    "Orchestral strings / harp",
    "Timpani",
    "String ensemble 1",
    "String ensemble 2 / slow strings",
    "Synth strings 1",
    "Synth strings 2",
    "Choir aahs",
    "Voice oohs",
    "Synth choir / voice",
    "Orchestra hit",
    "Trumpet",
    "Trombone",
    "Tuba",
    "Muted trumpet",
    "French horn",
    "Brass ensemble",
    "Synth brass 1",
    "Synth brass 2",
    "Soprano sax",
    "Alto sax",
    "Tenor sax",
    "Baritone sax",
    "Oboe",
    "English horn",
    "Bassoon",
    "Clarinet",
    "Piccolo",
    "Flute",
    "Recorder",
    "Pan flute",
    "Bottle blow / blown bottle",
    "Shakuhachi",
    "Whistle",
    "Ocarina",
    "Synth square wave",
    "Synth saw wave",
    "Synth calliope",
    "Synth chiff",
    "Synth charang",
    "Synth voice",
    "Synth fifths saw",
    "Synth brass and lead",
    "Fantasia / new age",
    "Warm pad",
    "Polysynth",
    "Space vox / choir",
    "Bowed glass",
    "Metal pad",
    "Halo pad",
    "Sweep pad",
    "Ice rain",
    "Soundtrack",
    "Crystal",
    "Atmosphere",
    "Brightness",
    "Goblins",
    "Echo drops / echoes",
    "Sci fi",
    "Sitar",
    "Banjo",
    "Shamisen",
    "Koto",
    "Kalimba",
    "Bag pipe",
    "Fiddle",
    "Shanai",
    "Tinkle bell",
    "Agogo",
    "Steel drums",
    "Woodblock",
    "Taiko drum",
    "Melodic tom",
    "Synth drum",
    "Reverse cymbal",
    "Guitar fret noise",
    "Breath noise",
    "Seashore",
    "Bird tweet",
    "Telephone ring",
    "Helicopter",
    "Applause",
    "Gunshot",
];

/// Name of a General MIDI program
#[must_use]
pub fn program_name(program: u8) -> Option<&'static str> {
    PROGRAM_NAMES.get(usize::from(program)).copied()
}

/// What one track uses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TrackSummary {
    /// Track index in the file
    pub index: usize,
    /// Last track-name meta event
    pub name: Option<String>,
    /// Channels used, with the last program selected on each
    pub channels: BTreeMap<u8, Option<u8>>,
}

impl fmt::Display for TrackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Track {} ({})", self.index, self.name.as_deref().unwrap_or("unnamed"))?;
        for (channel, program) in &self.channels {
            let program = program.and_then(program_name).unwrap_or("no program");
            write!(f, "\n  Channel {channel}: {program}")?;
        }
        Ok(())
    }
}

/// Summaries of every track in a score
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Roster {
    tracks: Vec<TrackSummary>,
}

impl Roster {
    /// Walk every track of `score` once.
    pub fn from_score(score: &Score) -> Result<Self> {
        let mut tracks = Vec::with_capacity(score.tracks().len());
        for track in score.tracks() {
            let mut summary = TrackSummary {
                index: track.index(),
                ..TrackSummary::default()
            };
            for timed in track {
                match timed?.event {
                    TrackEvent::Meta(MetaEvent::TrackName(name)) => summary.name = Some(name),
                    TrackEvent::Channel(event) => {
                        let program = summary.channels.entry(event.channel).or_default();
                        if let ChannelMessage::ProgramChange { program: selected } = event.message {
                            *program = Some(selected);
                        }
                    }
                    _ => {}
                }
            }
            tracks.push(summary);
        }
        Ok(Self { tracks })
    }

    /// Summaries in track order
    #[must_use]
    pub fn tracks(&self) -> &[TrackSummary] {
        &self.tracks
    }

    /// Summary of track `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TrackSummary> {
        self.tracks.get(index)
    }
}
