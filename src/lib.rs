#![doc(html_root_url = "https://docs.rs/tspackager/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tspackager - MPEG-2 Transport Stream segment writer
//!
//! `tspackager` writes the PES packets of one elementary stream as a series
//! of self-contained MPEG-2 TS segments, the way HLS packagers do. Every
//! segment starts with PAT and PMT, continuity counters run across segments,
//! and streams can switch from a clear lead to SAMPLE-AES signalling.
//!
//! ## Features
//!
//! - H.264, H.265, AAC, AC-3, E-AC-3 and MPEG audio elementary streams
//! - PCR and random access signalling on every PES packet
//! - Clear-lead encryption with the SAMPLE-AES PMT variants
//! - Segment files on disk or in memory
//! - An async front end running writers on tokio's blocking pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tspackager::av::{CodecType, VideoStreamInfo};
//! use tspackager::format::ts::{LocalFileSystem, PesPacket, TsWriter};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut writer = TsWriter::new().with_file_system(LocalFileSystem::with_root("out"));
//!     writer.initialize(&VideoStreamInfo::new(CodecType::H264, 1920, 1080).into(), false)?;
//!
//!     writer.new_segment("segment_0.ts")?;
//!     writer.add_pes_packet(
//!         PesPacket::video(vec![0u8; 4096])
//!             .with_pts(3600)
//!             .with_dts(0)
//!             .with_key_frame(true),
//!     )?;
//!     let summary = writer.finalize_segment()?;
//!     println!("wrote {} bytes to {}", summary.bytes, summary.file_name);
//!     Ok(())
//! }
//! ```
//!
//! ### Async Pipeline Example
//!
//! ```rust,no_run
//! use tspackager::av::{AudioStreamInfo, CodecType};
//! use tspackager::format::ts::{PesPacket, SegmentPipeline, TsWriter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = AudioStreamInfo::new(CodecType::AAC, 48_000, 2)
//!         .with_codec_config(vec![0x11, 0x90])
//!         .into();
//!     let mut writer = TsWriter::new();
//!     writer.initialize(&stream, false)?;
//!
//!     let pipeline = SegmentPipeline::spawn(writer)?;
//!     pipeline.new_segment("audio_0.ts").await?;
//!     pipeline.add_pes_packet(PesPacket::audio(vec![0u8; 256]).with_pts(0)).await?;
//!     pipeline.finalize_segment().await?;
//!     pipeline.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: Stream descriptions handed to the writer
//! - `codec`: Codec configuration parsing (AAC AudioSpecificConfig)
//! - `config`: Writer configuration and its file format
//! - `format`: The TS writer, packetizer, PSI tables and output files
//! - `error`: Error type and `Result` alias
//! - `utils`: Bit reading and MPEG CRC32
//!
/// Audio/Video stream descriptions
pub mod av;

/// Codec configuration parsing
pub mod codec;

/// Error types and utilities
pub mod error;

/// Media format implementations
pub mod format;

/// Common utilities and helper functions
pub mod utils;

/// Configuration module
pub mod config;

pub use config::TsWriterConfig;
pub use error::{Result, TsError};
