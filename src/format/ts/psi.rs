//! Program Specific Information: PAT and PMT section construction.
//!
//! [`ProgramMapTableWriter`] is the seam between the TS writer, which decides
//! when tables are emitted and wraps them into TS packets, and the code that
//! knows what the tables contain. [`StreamTableWriter`] is the production
//! implementation for a single-program, single-stream transport stream with
//! optional SAMPLE-AES signalling.

use super::types::*;
use crate::av::{CodecType, StreamInfo};
use crate::codec::aac::{AudioObjectType, AudioSpecificConfig};
use crate::config::TsWriterConfig;
use crate::error::{Result, TsError};
use crate::utils::Crc32Mpeg2;
use bytes::{BufMut, BytesMut};

pub const DESCRIPTOR_TAG_REGISTRATION: u8 = 0x05;
pub const DESCRIPTOR_TAG_PRIVATE_DATA_INDICATOR: u8 = 0x0f;

/// Format identifier of the registration descriptor carrying audio setup data.
const AUDIO_SETUP_FORMAT_IDENTIFIER: &[u8; 4] = b"apad";
const AUDIO_SETUP_PRIMING: u16 = 0;
const AUDIO_SETUP_VERSION: u8 = 1;

/// Longest section a single-program table may produce.
const MAX_SECTION_LENGTH: usize = 1021;

/// Produces PSI sections for the TS writer.
///
/// Implementations append one complete section (table_id through CRC32) per
/// call. The writer calls [`signal_encrypted`](Self::signal_encrypted) once,
/// before emitting the PMT of the first encrypted segment; every PMT written
/// after that must describe the encrypted stream.
pub trait ProgramMapTableWriter: Send {
    fn write_pat(&self, section: &mut BytesMut) -> Result<()>;

    fn write_pmt(&mut self, section: &mut BytesMut) -> Result<()>;

    fn signal_encrypted(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub tag: u8,
    pub data: Vec<u8>,
}

impl Descriptor {
    /// private_data_indicator_descriptor naming the encryption scheme.
    pub fn private_data_indicator(fourcc: &[u8; 4]) -> Self {
        Self {
            tag: DESCRIPTOR_TAG_PRIVATE_DATA_INDICATOR,
            data: fourcc.to_vec(),
        }
    }

    /// registration_descriptor with `apad` audio setup information.
    pub fn audio_setup(audio_type: &[u8; 4], setup_data: &[u8]) -> Result<Self> {
        if setup_data.len() > 255 - 12 {
            return Err(TsError::UnsupportedStream(format!(
                "audio setup data too long: {} bytes",
                setup_data.len()
            )));
        }
        let mut data = Vec::with_capacity(12 + setup_data.len());
        data.extend_from_slice(AUDIO_SETUP_FORMAT_IDENTIFIER);
        data.extend_from_slice(audio_type);
        data.extend_from_slice(&AUDIO_SETUP_PRIMING.to_be_bytes());
        data.push(AUDIO_SETUP_VERSION);
        data.push(setup_data.len() as u8);
        data.extend_from_slice(setup_data);
        Ok(Self {
            tag: DESCRIPTOR_TAG_REGISTRATION,
            data,
        })
    }

    fn len(&self) -> usize {
        2 + self.data.len()
    }

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag);
        buf.put_u8(self.data.len() as u8);
        buf.put_slice(&self.data);
    }
}

#[derive(Debug, Clone)]
pub struct PatEntry {
    pub program_number: u16,
    pub program_map_pid: u16,
}

#[derive(Debug, Clone, Default)]
pub struct Pat {
    pub transport_stream_id: u16,
    pub entries: Vec<PatEntry>,
}

impl Pat {
    pub fn write_section(&self, crc: &Crc32Mpeg2, out: &mut BytesMut) -> Result<()> {
        let mut body = BytesMut::with_capacity(self.entries.len() * 4);
        for entry in &self.entries {
            body.put_u16(entry.program_number);
            body.put_u16(entry.program_map_pid & 0x1fff | 7 << 13);
        }
        write_section(TABLE_ID_PAT, self.transport_stream_id, 0, &body, crc, out)
    }
}

#[derive(Debug, Clone)]
pub struct ElementaryStreamInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub descriptors: Vec<Descriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct Pmt {
    pub program_number: u16,
    pub version: u8,
    pub pcr_pid: u16,
    pub program_descriptors: Vec<Descriptor>,
    pub elementary_stream_infos: Vec<ElementaryStreamInfo>,
}

impl Pmt {
    pub fn write_section(&self, crc: &Crc32Mpeg2, out: &mut BytesMut) -> Result<()> {
        let mut body = BytesMut::new();
        body.put_u16(self.pcr_pid & 0x1fff | 7 << 13);

        let program_info_length: usize = self.program_descriptors.iter().map(Descriptor::len).sum();
        body.put_u16((program_info_length as u16) & 0x3ff | 0xf << 12);
        for desc in &self.program_descriptors {
            desc.write_to(&mut body);
        }

        for info in &self.elementary_stream_infos {
            body.put_u8(info.stream_type);
            body.put_u16(info.elementary_pid & 0x1fff | 7 << 13);

            let es_info_length: usize = info.descriptors.iter().map(Descriptor::len).sum();
            body.put_u16((es_info_length as u16) & 0x3ff | 0xf << 12);
            for desc in &info.descriptors {
                desc.write_to(&mut body);
            }
        }

        write_section(
            TABLE_ID_PMT,
            self.program_number,
            self.version,
            &body,
            crc,
            out,
        )
    }
}

/// Long-form section header, `body`, then CRC32 over everything before it.
fn write_section(
    table_id: u8,
    table_id_extension: u16,
    version: u8,
    body: &[u8],
    crc: &Crc32Mpeg2,
    out: &mut BytesMut,
) -> Result<()> {
    // 5 bytes of header after the length field, 4 bytes of CRC
    let section_length = 5 + body.len() + 4;
    if section_length > MAX_SECTION_LENGTH {
        return Err(TsError::UnsupportedStream(format!(
            "section of {} bytes exceeds {}",
            section_length, MAX_SECTION_LENGTH
        )));
    }

    let start = out.len();
    out.put_u8(table_id);
    out.put_u16(0xb000 | section_length as u16);
    out.put_u16(table_id_extension);
    out.put_u8(0xc1 | (version & 0x1f) << 1);
    out.put_u8(0); // section_number
    out.put_u8(0); // last_section_number
    out.put_slice(body);

    let checksum = crc.calculate(&out[start..]);
    out.put_u32(checksum);
    Ok(())
}

/// How the elementary stream is described once encryption starts.
#[derive(Debug, Clone)]
struct EncryptedDescription {
    stream_type: u8,
    descriptors: Vec<Descriptor>,
}

/// PAT/PMT writer for the single stream described by a [`StreamInfo`].
pub struct StreamTableWriter {
    pat: Pat,
    program_number: u16,
    pcr_pid: u16,
    elementary_pid: u16,
    clear_stream_type: u8,
    encrypted: Option<EncryptedDescription>,
    encryption_active: bool,
    clear_pmt_written: bool,
    crc: Crc32Mpeg2,
}

impl StreamTableWriter {
    /// Fails with [`TsError::UnsupportedStream`] when the codec cannot be
    /// carried in a transport stream or its configuration does not parse.
    pub fn new(stream_info: &StreamInfo, config: &TsWriterConfig) -> Result<Self> {
        let (clear_stream_type, encrypted) = describe_stream(stream_info)?;

        Ok(Self {
            pat: Pat {
                transport_stream_id: config.transport_stream_id,
                entries: vec![PatEntry {
                    program_number: config.program_number,
                    program_map_pid: config.pmt_pid,
                }],
            },
            program_number: config.program_number,
            pcr_pid: config.elementary_pid,
            elementary_pid: config.elementary_pid,
            clear_stream_type,
            encrypted,
            encryption_active: false,
            clear_pmt_written: false,
            crc: Crc32Mpeg2::new(),
        })
    }

    /// True when the codec has a SAMPLE-AES signalling.
    pub fn supports_encryption(&self) -> bool {
        self.encrypted.is_some()
    }

    fn current_pmt(&self) -> Result<Pmt> {
        let (version, stream_type, descriptors) = if self.encryption_active {
            let encrypted = self.encrypted.as_ref().ok_or_else(|| {
                TsError::UnsupportedStream("stream has no encrypted description".into())
            })?;
            // A clear lead was announced with version 0; bump so players
            // pick up the new stream type.
            let version = if self.clear_pmt_written { 1 } else { 0 };
            (version, encrypted.stream_type, encrypted.descriptors.clone())
        } else {
            (0, self.clear_stream_type, Vec::new())
        };

        Ok(Pmt {
            program_number: self.program_number,
            version,
            pcr_pid: self.pcr_pid,
            program_descriptors: Vec::new(),
            elementary_stream_infos: vec![ElementaryStreamInfo {
                stream_type,
                elementary_pid: self.elementary_pid,
                descriptors,
            }],
        })
    }
}

impl ProgramMapTableWriter for StreamTableWriter {
    fn write_pat(&self, section: &mut BytesMut) -> Result<()> {
        self.pat.write_section(&self.crc, section)
    }

    fn write_pmt(&mut self, section: &mut BytesMut) -> Result<()> {
        self.current_pmt()?.write_section(&self.crc, section)?;
        if !self.encryption_active {
            self.clear_pmt_written = true;
        }
        Ok(())
    }

    fn signal_encrypted(&mut self) -> Result<()> {
        if self.encrypted.is_none() {
            return Err(TsError::UnsupportedStream(
                "codec has no encrypted transport signalling".into(),
            ));
        }
        self.encryption_active = true;
        Ok(())
    }
}

fn describe_stream(stream_info: &StreamInfo) -> Result<(u8, Option<EncryptedDescription>)> {
    let codec = match stream_info.codec() {
        Some(codec) => codec,
        None => {
            return Err(TsError::UnsupportedStream(format!(
                "{:?} streams cannot be carried in TS",
                stream_info.kind()
            )))
        }
    };

    let described = match codec {
        CodecType::H264 => (
            STREAM_TYPE_H264,
            Some(EncryptedDescription {
                stream_type: STREAM_TYPE_ENCRYPTED_H264,
                descriptors: vec![Descriptor::private_data_indicator(b"zavc")],
            }),
        ),
        CodecType::H265 => (STREAM_TYPE_H265, None),
        CodecType::AAC => {
            let config = stream_info.codec_config();
            let parsed = AudioSpecificConfig::parse(config).map_err(|e| {
                TsError::UnsupportedStream(format!("invalid AAC configuration: {}", e))
            })?;
            let audio_type = match parsed.extension_object_type {
                Some(AudioObjectType::PS) => b"zacp",
                Some(AudioObjectType::SBR) => b"zach",
                _ => b"zaac",
            };
            (
                STREAM_TYPE_AAC,
                Some(encrypted_audio(STREAM_TYPE_ENCRYPTED_AAC, b"aacd", audio_type, config)?),
            )
        }
        CodecType::AC3 => (
            STREAM_TYPE_AC3,
            Some(encrypted_audio(
                STREAM_TYPE_ENCRYPTED_AC3,
                b"ac3d",
                b"zac3",
                stream_info.codec_config(),
            )?),
        ),
        CodecType::EAC3 => (
            STREAM_TYPE_EAC3,
            Some(encrypted_audio(
                STREAM_TYPE_ENCRYPTED_EAC3,
                b"ec3d",
                b"zec3",
                stream_info.codec_config(),
            )?),
        ),
        CodecType::MP3 => (STREAM_TYPE_MPEG1_AUDIO, None),
        CodecType::OPUS | CodecType::VP9 => {
            return Err(TsError::UnsupportedStream(format!(
                "codec {:?} is not supported in TS",
                codec
            )))
        }
    };
    Ok(described)
}

fn encrypted_audio(
    stream_type: u8,
    scheme: &[u8; 4],
    audio_type: &[u8; 4],
    setup_data: &[u8],
) -> Result<EncryptedDescription> {
    Ok(EncryptedDescription {
        stream_type,
        descriptors: vec![
            Descriptor::private_data_indicator(scheme),
            Descriptor::audio_setup(audio_type, setup_data)?,
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::{AudioStreamInfo, TextStreamInfo, VideoStreamInfo};
    use pretty_assertions::assert_eq;

    fn h264() -> StreamInfo {
        VideoStreamInfo::new(CodecType::H264, 1280, 720).into()
    }

    fn aac() -> StreamInfo {
        AudioStreamInfo::new(CodecType::AAC, 44_100, 2)
            .with_codec_config(vec![0x12, 0x10])
            .into()
    }

    #[test]
    fn test_pat_section() {
        let writer = StreamTableWriter::new(&h264(), &TsWriterConfig::default()).unwrap();
        let mut section = BytesMut::new();
        writer.write_pat(&mut section).unwrap();

        assert_eq!(
            &section[..12],
            &[0x00, 0xb0, 0x0d, 0x00, 0x01, 0xc1, 0x00, 0x00, 0x00, 0x01, 0xe0, 0x20]
        );
        assert_eq!(section.len(), 16);
        assert!(Crc32Mpeg2::new().verify(&section));
    }

    #[test]
    fn test_clear_h264_pmt() {
        let mut writer = StreamTableWriter::new(&h264(), &TsWriterConfig::default()).unwrap();
        let mut section = BytesMut::new();
        writer.write_pmt(&mut section).unwrap();

        assert_eq!(
            &section[..section.len() - 4],
            &[
                0x02, 0xb0, 0x12, // table id, section length 18
                0x00, 0x01, 0xc1, 0x00, 0x00, // program 1, version 0
                0xe0, 0x50, 0xf0, 0x00, // PCR PID, no program info
                0x1b, 0xe0, 0x50, 0xf0, 0x00, // H.264 on 0x50
            ]
        );
        assert!(Crc32Mpeg2::new().verify(&section));
    }

    #[test]
    fn test_encrypted_h264_pmt_after_clear_lead() {
        let mut writer = StreamTableWriter::new(&h264(), &TsWriterConfig::default()).unwrap();
        let mut clear = BytesMut::new();
        writer.write_pmt(&mut clear).unwrap();

        writer.signal_encrypted().unwrap();
        let mut encrypted = BytesMut::new();
        writer.write_pmt(&mut encrypted).unwrap();

        assert_eq!(encrypted[5], 0xc3); // version 1
        assert_eq!(
            &encrypted[12..23],
            &[0xdb, 0xe0, 0x50, 0xf0, 0x06, 0x0f, 0x04, b'z', b'a', b'v', b'c']
        );
        assert!(Crc32Mpeg2::new().verify(&encrypted));
    }

    #[test]
    fn test_encrypted_from_start_keeps_version_zero() {
        let mut writer = StreamTableWriter::new(&h264(), &TsWriterConfig::default()).unwrap();
        writer.signal_encrypted().unwrap();
        let mut section = BytesMut::new();
        writer.write_pmt(&mut section).unwrap();

        assert_eq!(section[5], 0xc1);
        assert_eq!(section[12], STREAM_TYPE_ENCRYPTED_H264);
    }

    #[test]
    fn test_encrypted_aac_pmt() {
        let mut writer = StreamTableWriter::new(&aac(), &TsWriterConfig::default()).unwrap();
        writer.signal_encrypted().unwrap();
        let mut section = BytesMut::new();
        writer.write_pmt(&mut section).unwrap();

        let es = &section[12..section.len() - 4];
        assert_eq!(es[0], STREAM_TYPE_ENCRYPTED_AAC);
        // es_info_length: 6 (private data indicator) + 16 (registration)
        assert_eq!(&es[3..5], &[0xf0, 0x16]);
        assert_eq!(&es[5..11], &[0x0f, 0x04, b'a', b'a', b'c', b'd']);
        assert_eq!(
            &es[11..],
            &[
                0x05, 0x0e, b'a', b'p', b'a', b'd', b'z', b'a', b'a', b'c', 0x00, 0x00, 0x01,
                0x02, 0x12, 0x10
            ]
        );
    }

    fn encrypted_audio_descriptors(stream: &StreamInfo) -> (u8, Vec<u8>) {
        let mut writer = StreamTableWriter::new(stream, &TsWriterConfig::default()).unwrap();
        writer.signal_encrypted().unwrap();
        let mut section = BytesMut::new();
        writer.write_pmt(&mut section).unwrap();
        let es = &section[12..section.len() - 4];
        (es[0], es[5..].to_vec())
    }

    #[test]
    fn test_he_aac_audio_types() {
        let he_aac: StreamInfo = AudioStreamInfo::new(CodecType::AAC, 48_000, 1)
            .with_codec_config(vec![0x2b, 0x09, 0x88, 0x00])
            .into();
        let (_, descriptors) = encrypted_audio_descriptors(&he_aac);
        assert_eq!(&descriptors[8..16], b"apadzach");

        let he_aac_v2: StreamInfo = AudioStreamInfo::new(CodecType::AAC, 48_000, 2)
            .with_codec_config(vec![0xeb, 0x09, 0x88])
            .into();
        let (_, descriptors) = encrypted_audio_descriptors(&he_aac_v2);
        assert_eq!(&descriptors[8..16], b"apadzacp");
    }

    #[test]
    fn test_encrypted_ac3_and_eac3_pmt() {
        let ac3: StreamInfo = AudioStreamInfo::new(CodecType::AC3, 48_000, 6)
            .with_codec_config(vec![0x10, 0x3d, 0xe0])
            .into();
        let (stream_type, descriptors) = encrypted_audio_descriptors(&ac3);
        assert_eq!(stream_type, STREAM_TYPE_ENCRYPTED_AC3);
        assert_eq!(&descriptors[..6], &[0x0f, 0x04, b'a', b'c', b'3', b'd']);
        assert_eq!(
            &descriptors[6..],
            &[
                0x05, 0x0f, b'a', b'p', b'a', b'd', b'z', b'a', b'c', b'3', 0x00, 0x00, 0x01,
                0x03, 0x10, 0x3d, 0xe0
            ]
        );

        let eac3: StreamInfo = AudioStreamInfo::new(CodecType::EAC3, 48_000, 6).into();
        let (stream_type, descriptors) = encrypted_audio_descriptors(&eac3);
        assert_eq!(stream_type, STREAM_TYPE_ENCRYPTED_EAC3);
        assert_eq!(&descriptors[2..6], b"ec3d");
        assert_eq!(&descriptors[8..16], b"apadzec3");
        assert_eq!(descriptors[7], 12);
    }

    #[test]
    fn test_custom_pids() {
        let config = TsWriterConfig {
            pmt_pid: 0x1000,
            elementary_pid: 0x101,
            program_number: 7,
            transport_stream_id: 9,
            ..Default::default()
        };
        let mut writer = StreamTableWriter::new(&aac(), &config).unwrap();

        let mut pat = BytesMut::new();
        writer.write_pat(&mut pat).unwrap();
        assert_eq!(&pat[3..5], &[0x00, 0x09]);
        assert_eq!(&pat[8..12], &[0x00, 0x07, 0xf0, 0x00]);

        let mut pmt = BytesMut::new();
        writer.write_pmt(&mut pmt).unwrap();
        assert_eq!(&pmt[3..5], &[0x00, 0x07]);
        assert_eq!(&pmt[8..10], &[0xe1, 0x01]);
        assert_eq!(pmt[12], STREAM_TYPE_AAC);
    }

    #[test]
    fn test_unsupported_streams() {
        let config = TsWriterConfig::default();

        let vp9: StreamInfo = VideoStreamInfo::new(CodecType::VP9, 640, 360).into();
        assert!(matches!(
            StreamTableWriter::new(&vp9, &config),
            Err(TsError::UnsupportedStream(_))
        ));

        let text = StreamInfo::Text(TextStreamInfo {
            codec_string: "wvtt".into(),
            time_scale: 1000,
        });
        assert!(StreamTableWriter::new(&text, &config).is_err());

        let bad_aac: StreamInfo = AudioStreamInfo::new(CodecType::AAC, 44_100, 2).into();
        assert!(matches!(
            StreamTableWriter::new(&bad_aac, &config),
            Err(TsError::UnsupportedStream(_))
        ));
    }

    #[test]
    fn test_hevc_has_no_encrypted_variant() {
        let hevc: StreamInfo = VideoStreamInfo::new(CodecType::H265, 1920, 1080).into();
        let mut writer = StreamTableWriter::new(&hevc, &TsWriterConfig::default()).unwrap();

        assert!(!writer.supports_encryption());
        assert!(writer.signal_encrypted().is_err());

        let mut section = BytesMut::new();
        writer.write_pmt(&mut section).unwrap();
        assert_eq!(section[12], STREAM_TYPE_H265);
    }
}
