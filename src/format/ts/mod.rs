//! # MPEG Transport Stream (TS) segment writing
//!
//! This module turns the PES packets of a single elementary stream into
//! self-contained TS segments, as used by HLS:
//!
//! - PES packet construction and serialization
//! - Packetization into 188-byte TS packets with continuity counters and PCR
//! - PAT/PMT generation, including SAMPLE-AES signalling for clear-lead
//!   encrypted streams
//! - Segment files on disk or in memory
//! - Packet-level inspection of the written output
//!
//! ## Example Usage
//!
//! ```rust
//! use tspackager::av::{AudioStreamInfo, CodecType};
//! use tspackager::format::ts::{MemoryFileSystem, PesPacket, TsWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let files = MemoryFileSystem::new();
//! let mut writer = TsWriter::new().with_file_system(files.clone());
//!
//! let stream = AudioStreamInfo::new(CodecType::AAC, 44_100, 2)
//!     .with_codec_config(vec![0x12, 0x10])
//!     .into();
//! writer.initialize(&stream, true)?;
//!
//! // clear lead
//! writer.new_segment("seg0.ts")?;
//! writer.add_pes_packet(PesPacket::audio(vec![0u8; 300]).with_pts(0))?;
//! writer.signal_encrypted()?;
//! writer.finalize_segment()?;
//!
//! // announced as SAMPLE-AES from here on
//! writer.new_segment("seg1.ts")?;
//! writer.add_pes_packet(PesPacket::audio(vec![0u8; 300]).with_pts(1920))?;
//! assert!(writer.finalize_segment()?.encrypted);
//! # Ok(())
//! # }
//! ```

/// Per-PID continuity counters
pub mod continuity;

/// Segment destinations
pub mod file;

/// TS packetization of PES packets and PSI sections
pub mod muxer;

/// Low-level TS packet parsing utilities
pub mod parser;

/// PES packet handling
pub mod pes;

/// Async front end for a writer
pub mod pipeline;

/// PAT/PMT construction
pub mod psi;

/// Core TS types and constants
pub mod types;

/// The segmenting writer
pub mod writer;


// Re-export commonly used types and constants
pub use continuity::ContinuityCounter;
pub use file::{FileSystem, LocalFileSystem, MemoryFileSystem, SegmentFile};
pub use parser::{ParsedPacket, TsPacketParser};
pub use pes::PesPacket;
pub use pipeline::SegmentPipeline;
pub use psi::{ProgramMapTableWriter, StreamTableWriter};
pub use types::{
    TsHeader,
    PID_PAT,
    STREAM_TYPE_AAC,
    STREAM_TYPE_ENCRYPTED_AAC,
    STREAM_TYPE_ENCRYPTED_H264,
    STREAM_TYPE_H264,
    TS_PACKET_SIZE,
};
pub use writer::{ContinuityCounters, EncryptionState, SegmentSummary, TsWriter};
