//! pcap capture of bus traffic

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};

/// `LINKTYPE_USER0`: frames are opaque to generic dissectors
const LINKTYPE_G6: u32 = 147;
const SNAPLEN: usize = 1 + 2 * 256;

/// Which way a captured frame travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// Master to node
    Outbound = 0,
    /// Node to master
    Inbound = 1,
}

/// Appends every bus frame to a pcap file.
///
/// Each record is `[direction] [frame bytes..]`, frames as they were on the
/// wire.
pub struct WireCapture {
    out: Mutex<BufWriter<File>>,
}

impl WireCapture {
    /// Create the capture file at `path`, replacing any existing file.
    pub fn create(path: &Path) -> io::Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);

        let mut header = BytesMut::with_capacity(24);
        header.put_u32_le(0xA1B2_C3D4);
        header.put_u16_le(2);
        header.put_u16_le(4);
        header.put_i32_le(0);
        header.put_u32_le(0);
        header.put_u32_le(SNAPLEN as u32);
        header.put_u32_le(LINKTYPE_G6);
        out.write_all(&header)?;
        out.flush()?;

        Ok(Self {
            out: Mutex::new(out),
        })
    }

    /// Append one frame stamped with the current time.
    pub fn record(&self, direction: Direction, frame: &[u8]) -> io::Result<()> {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let kept = frame.len().min(SNAPLEN - 1);
        let captured = (kept + 1) as u32;

        let mut record = BytesMut::with_capacity(16 + 1 + kept);
        record.put_u32_le(u32::try_from(since_epoch.as_secs()).unwrap_or(u32::MAX));
        record.put_u32_le(since_epoch.subsec_micros());
        record.put_u32_le(captured);
        record.put_u32_le((frame.len() + 1) as u32);
        record.put_u8(direction as u8);
        record.put_slice(&frame[..kept]);

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(&record)?;
        out.flush()
    }
}

impl std::fmt::Debug for WireCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireCapture").finish_non_exhaustive()
    }
}
