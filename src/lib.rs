//! G6 - bus master and score timing engine for chains of musical instrument
//! controllers
//!
//! A single host drives a half-duplex, multi-drop serial bus. Nodes on the
//! bus are discovered at runtime, queried for their capabilities and then
//! sent time-stamped note, light and control commands derived from a parsed
//! score.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use g6::bus::{BusConfig, Master};
//! use g6::conductor;
//! use g6::score::Score;
//! use g6::transport::TcpTransport;
//!
//! let transport = TcpTransport::connect("127.0.0.1:7600")?;
//! let mut master = Master::new(transport, BusConfig::default())?;
//! master.enumerate()?;
//!
//! let score = Score::parse(std::fs::read("song.mid")?)?;
//! let mapping = conductor::assign_tracks(&score.roster()?, master.nodes());
//! conductor::perform(score.mixer()?, &mapping, master.nodes_mut())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Layout
//!
//! - [`protocol`] - frame codec, command set and capability descriptors
//! - [`transport`] - byte transports the master can drive
//! - [`bus`] - the master, its nodes and the resend policy
//! - [`score`] - score parsing and tempo-aware mixing
//! - [`conductor`] - mapping mixed events onto node commands

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bus;
pub mod conductor;
pub mod protocol;
pub mod score;
pub mod transport;

pub use bus::{BusConfig, BusError, Master, Node};
pub use protocol::{Command, Error, PacketIn, PacketOut, Result};
pub use score::{MixedEvent, Mixer, Score, ScoreError};
pub use transport::Transport;

/// G6 protocol version implemented
pub const VERSION: &str = "0.3.0";
