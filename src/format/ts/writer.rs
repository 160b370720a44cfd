//! Segmenting TS writer.
//!
//! [`TsWriter`] turns the PES packets of one elementary stream into a series
//! of TS segment files. Each segment starts with PAT and PMT so it can be
//! decoded on its own; continuity counters run across segment boundaries.
//!
//! ```rust
//! use tspackager::av::{CodecType, VideoStreamInfo};
//! use tspackager::format::ts::{MemoryFileSystem, PesPacket, TsWriter, TS_PACKET_SIZE};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let files = MemoryFileSystem::new();
//! let mut writer = TsWriter::new().with_file_system(files.clone());
//!
//! let stream = VideoStreamInfo::new(CodecType::H264, 1280, 720).into();
//! writer.initialize(&stream, false)?;
//!
//! writer.new_segment("seg0.ts")?;
//! writer.add_pes_packet(PesPacket::video(vec![0u8; 1000]).with_pts(0))?;
//! let summary = writer.finalize_segment()?;
//!
//! let data = files.get("seg0.ts").unwrap();
//! assert_eq!(data.len() as u64, summary.bytes);
//! assert_eq!(data.len() % TS_PACKET_SIZE, 0);
//! # Ok(())
//! # }
//! ```

use super::continuity::ContinuityCounter;
use super::file::{FileSystem, LocalFileSystem, SegmentFile};
use super::muxer::{write_pes_packets, write_psi_packets};
use super::pes::PesPacket;
use super::psi::{ProgramMapTableWriter, StreamTableWriter};
use super::types::PID_PAT;
use crate::av::StreamInfo;
use crate::config::TsWriterConfig;
use crate::error::{Result, TsError};
use bytes::BytesMut;
use log::{debug, error, trace, warn};

/// Encryption progression of a stream. Transitions only move forward:
/// `ClearLead → Pending → Encrypted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionState {
    /// Declared unencrypted at initialization.
    NeverEncrypted,
    /// Encryptable, but segments are still written in the clear.
    ClearLead,
    /// Signalled; the next segment will be encrypted.
    Pending,
    Encrypted,
}

/// Continuity counters of the three PIDs a writer emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContinuityCounters {
    pub pat: ContinuityCounter,
    pub pmt: ContinuityCounter,
    pub elementary: ContinuityCounter,
}

/// Result of a finalized segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSummary {
    pub file_name: String,
    pub encrypted: bool,
    pub pes_packets: usize,
    /// TS packets in the file, PSI included.
    pub ts_packets: usize,
    pub bytes: u64,
}

struct Segment {
    name: String,
    file: Box<dyn SegmentFile>,
    encrypted: bool,
    buffer: BytesMut,
    pes_packets: usize,
    ts_packets: usize,
    bytes_written: u64,
}

impl Segment {
    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.file.write_all(&self.buffer)?;
        self.bytes_written += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    fn finish(mut self) -> Result<SegmentSummary> {
        self.flush()?;
        let Segment {
            name,
            file,
            encrypted,
            pes_packets,
            ts_packets,
            bytes_written,
            ..
        } = self;
        file.close()?;

        Ok(SegmentSummary {
            file_name: name,
            encrypted,
            pes_packets,
            ts_packets,
            bytes: bytes_written,
        })
    }
}

enum WriterState {
    Uninitialized,
    /// Initialized, no segment open.
    Idle,
    SegmentOpen(Segment),
}

/// Takes PES packets, wraps them into TS packets and writes them to segment
/// files, emitting PSI for every segment.
pub struct TsWriter {
    config: TsWriterConfig,
    file_system: Box<dyn FileSystem>,
    table_writer: Option<Box<dyn ProgramMapTableWriter>>,
    state: WriterState,
    encryption: EncryptionState,
    counters: ContinuityCounters,
}

impl Default for TsWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TsWriter {
    /// Writer with the default configuration, writing to the local disk.
    pub fn new() -> Self {
        Self {
            config: TsWriterConfig::default(),
            file_system: Box::new(LocalFileSystem::new()),
            table_writer: None,
            state: WriterState::Uninitialized,
            encryption: EncryptionState::NeverEncrypted,
            counters: ContinuityCounters::default(),
        }
    }

    pub fn with_config(config: TsWriterConfig) -> Result<Self> {
        config.validate()?;
        let mut writer = Self::new();
        writer.config = config;
        Ok(writer)
    }

    pub fn with_file_system<F: FileSystem + 'static>(mut self, file_system: F) -> Self {
        self.file_system = Box::new(file_system);
        self
    }

    /// Replaces the PSI table writer that `initialize` would build from the
    /// stream info. Meant for tests.
    pub fn with_table_writer(mut self, table_writer: Box<dyn ProgramMapTableWriter>) -> Self {
        self.table_writer = Some(table_writer);
        self
    }

    /// Must be called once before any other operation.
    ///
    /// `will_be_encrypted` must be true if any segment may be encrypted later,
    /// even if the whole stream ends up in the clear.
    pub fn initialize(&mut self, stream_info: &StreamInfo, will_be_encrypted: bool) -> Result<()> {
        if !matches!(self.state, WriterState::Uninitialized) {
            return Err(TsError::InvalidState("writer is already initialized".into()));
        }

        let table_writer = StreamTableWriter::new(stream_info, &self.config).map_err(|e| {
            error!("TsWriter cannot handle stream {:?}: {}", stream_info.codec(), e);
            e
        })?;
        if will_be_encrypted && !table_writer.supports_encryption() {
            return Err(TsError::UnsupportedStream(format!(
                "{:?} cannot be encrypted in TS",
                stream_info.codec()
            )));
        }

        if self.table_writer.is_none() {
            self.table_writer = Some(Box::new(table_writer));
        }
        self.counters = ContinuityCounters::default();
        self.encryption = if will_be_encrypted {
            EncryptionState::ClearLead
        } else {
            EncryptionState::NeverEncrypted
        };
        self.state = WriterState::Idle;

        debug!(
            "TsWriter initialized for {:?}, will_be_encrypted={}",
            stream_info.codec(),
            will_be_encrypted
        );
        Ok(())
    }

    /// Opens `file_name` and writes PAT and PMT to it. Fails if the previous
    /// segment has not been finalized.
    pub fn new_segment(&mut self, file_name: &str) -> Result<()> {
        match &self.state {
            WriterState::Uninitialized => {
                return Err(TsError::InvalidState("writer is not initialized".into()))
            }
            WriterState::SegmentOpen(segment) => {
                return Err(TsError::InvalidState(format!(
                    "segment {} is still open",
                    segment.name
                )))
            }
            WriterState::Idle => {}
        }

        let table_writer = self
            .table_writer
            .as_deref_mut()
            .ok_or_else(|| TsError::InvalidState("no table writer".into()))?;

        let encrypted = match self.encryption {
            EncryptionState::Pending => {
                table_writer.signal_encrypted()?;
                // delivered once, even if the open below fails
                self.encryption = EncryptionState::Encrypted;
                true
            }
            EncryptionState::Encrypted => true,
            EncryptionState::NeverEncrypted | EncryptionState::ClearLead => false,
        };

        // Opening truncates, so the tables must be ready first.
        let mut counters = self.counters;
        let mut buffer = BytesMut::with_capacity(self.config.flush_threshold);
        let ts_packets = emit_psi(table_writer, &self.config, &mut counters, &mut buffer)
            .map_err(|e| {
                error!("Failed to build PSI for {}: {}", file_name, e);
                e
            })?;

        let file = self.file_system.open(file_name).map_err(|e| {
            error!("Failed to open file {}: {}", file_name, e);
            e
        })?;

        self.counters = counters;
        self.state = WriterState::SegmentOpen(Segment {
            name: file_name.to_string(),
            file,
            encrypted,
            buffer,
            pes_packets: 0,
            ts_packets,
            bytes_written: 0,
        });

        debug!("Opened segment {} (encrypted={})", file_name, encrypted);
        Ok(())
    }

    /// Marks the rest of the segments as encrypted, starting with the next
    /// call to [`new_segment`](Self::new_segment). The open segment, if any,
    /// is not affected.
    pub fn signal_encrypted(&mut self) -> Result<()> {
        if matches!(self.state, WriterState::Uninitialized) {
            return Err(TsError::InvalidState("writer is not initialized".into()));
        }

        match self.encryption {
            EncryptionState::NeverEncrypted => {
                warn!("signal_encrypted called on a stream declared clear");
                Err(TsError::InvalidSignal(
                    "stream was initialized with will_be_encrypted=false".into(),
                ))
            }
            EncryptionState::ClearLead => {
                debug!("Encryption signalled, takes effect with the next segment");
                self.encryption = EncryptionState::Pending;
                Ok(())
            }
            EncryptionState::Pending | EncryptionState::Encrypted => Ok(()),
        }
    }

    /// Packetizes `pes_packet` into the open segment. Output is buffered and
    /// may not reach the file before [`finalize_segment`](Self::finalize_segment).
    ///
    /// On failure nothing of the packet is written and the continuity
    /// counters are unchanged.
    pub fn add_pes_packet(&mut self, pes_packet: PesPacket) -> Result<()> {
        let segment = match &mut self.state {
            WriterState::SegmentOpen(segment) => segment,
            WriterState::Uninitialized => {
                return Err(TsError::InvalidState("writer is not initialized".into()))
            }
            WriterState::Idle => {
                return Err(TsError::InvalidState("no open segment".into()))
            }
        };
        pes_packet.validate()?;

        let mut counters = self.counters;
        let mut ts_packets = 0;
        let rollback = segment.buffer.len();

        if let Some(interval) = self.config.psi_interval {
            if segment.pes_packets > 0 && segment.pes_packets % interval == 0 {
                let table_writer = self
                    .table_writer
                    .as_deref_mut()
                    .ok_or_else(|| TsError::InvalidState("no table writer".into()))?;
                ts_packets +=
                    emit_psi(table_writer, &self.config, &mut counters, &mut segment.buffer)?;
            }
        }

        ts_packets += write_pes_packets(
            &pes_packet,
            self.config.elementary_pid,
            &mut counters.elementary,
            &mut segment.buffer,
        );

        if segment.buffer.len() >= self.config.flush_threshold {
            if let Err(e) = segment.flush() {
                error!("Failed to write pes to file {}: {}", segment.name, e);
                segment.buffer.truncate(rollback);
                return Err(e);
            }
        }

        self.counters = counters;
        segment.pes_packets += 1;
        segment.ts_packets += ts_packets;
        trace!(
            "Added pes packet {} to {}, es counter now {}",
            segment.pes_packets,
            segment.name,
            self.counters.elementary.peek()
        );
        Ok(())
    }

    /// Writes everything buffered and closes the segment file. The file is
    /// released even when flushing fails.
    pub fn finalize_segment(&mut self) -> Result<SegmentSummary> {
        let segment = match std::mem::replace(&mut self.state, WriterState::Idle) {
            WriterState::SegmentOpen(segment) => segment,
            other => {
                self.state = other;
                return Err(TsError::InvalidState("no open segment to finalize".into()));
            }
        };

        let name = segment.name.clone();
        let summary = segment.finish().map_err(|e| {
            error!("Failed to finalize segment {}: {}", name, e);
            e
        })?;

        debug!(
            "Finalized segment {}: {} pes packets, {} ts packets, {} bytes",
            summary.file_name, summary.pes_packets, summary.ts_packets, summary.bytes
        );
        Ok(summary)
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, WriterState::Uninitialized)
    }

    pub fn has_open_segment(&self) -> bool {
        matches!(self.state, WriterState::SegmentOpen(_))
    }

    /// Whether the open segment is encrypted; false without an open segment.
    pub fn segment_encrypted(&self) -> bool {
        match &self.state {
            WriterState::SegmentOpen(segment) => segment.encrypted,
            _ => false,
        }
    }

    pub fn encryption_state(&self) -> EncryptionState {
        self.encryption
    }

    pub fn continuity_counters(&self) -> ContinuityCounters {
        self.counters
    }

    pub fn config(&self) -> &TsWriterConfig {
        &self.config
    }
}

impl Drop for TsWriter {
    fn drop(&mut self) {
        if let WriterState::SegmentOpen(segment) = &self.state {
            warn!("TsWriter dropped with segment {} still open", segment.name);
        }
    }
}

/// Writes PAT then PMT. Sections are built before any packet is written so
/// a failing table writer leaves `counters` and `out` untouched.
fn emit_psi(
    table_writer: &mut dyn ProgramMapTableWriter,
    config: &TsWriterConfig,
    counters: &mut ContinuityCounters,
    out: &mut BytesMut,
) -> Result<usize> {
    let mut pat = BytesMut::new();
    table_writer.write_pat(&mut pat)?;
    let mut pmt = BytesMut::new();
    table_writer.write_pmt(&mut pmt)?;

    let mut written = write_psi_packets(&pat, PID_PAT, &mut counters.pat, out);
    written += write_psi_packets(&pmt, config.pmt_pid, &mut counters.pmt, out);
    Ok(written)
}
