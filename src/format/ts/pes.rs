use super::types::{STREAM_ID_AUDIO, STREAM_ID_VIDEO, STREAM_ID_VIDEO_MAX, TIMESTAMP_MASK};
use crate::error::{Result, TsError};
use bytes::{BufMut, Bytes};

/// Fixed part of the PES header: start code, stream id, packet length,
/// two flag bytes and the header data length.
pub const PES_FIXED_HEADER_SIZE: usize = 9;
pub const PES_TIMESTAMP_SIZE: usize = 5;
/// Packet length values above this are written as 0 (unbounded), which
/// only video streams may use.
pub const MAX_PES_PACKET_LENGTH: usize = 0xffff;

const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];
/// '10' marker bits, no scrambling, no priority, not aligned, no copyright.
const PES_MARKER_FLAGS: u8 = 0x80;
const PTS_FLAG: u8 = 0x80;
const DTS_FLAG: u8 = 0x40;
const PTS_ONLY_PREFIX: u8 = 0x20;
const PTS_WITH_DTS_PREFIX: u8 = 0x30;
const DTS_PREFIX: u8 = 0x10;

/// One elementary stream access unit wrapped for the PES layer.
///
/// Timestamps are 90 kHz ticks; only the low 33 bits are written. A packet is
/// consumed by [`TsWriter::add_pes_packet`](super::TsWriter::add_pes_packet),
/// which turns header and payload into TS packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesPacket {
    stream_id: u8,
    pts: Option<u64>,
    dts: Option<u64>,
    is_key_frame: bool,
    data: Bytes,
}

impl PesPacket {
    pub fn new(stream_id: u8, data: impl Into<Bytes>) -> Self {
        Self {
            stream_id,
            pts: None,
            dts: None,
            is_key_frame: false,
            data: data.into(),
        }
    }

    /// Video packet on stream id 0xE0.
    pub fn video(data: impl Into<Bytes>) -> Self {
        Self::new(STREAM_ID_VIDEO, data)
    }

    /// Audio packet on stream id 0xC0.
    pub fn audio(data: impl Into<Bytes>) -> Self {
        Self::new(STREAM_ID_AUDIO, data)
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts);
        self
    }

    pub fn with_dts(mut self, dts: u64) -> Self {
        self.dts = Some(dts);
        self
    }

    pub fn with_key_frame(mut self, is_key_frame: bool) -> Self {
        self.is_key_frame = is_key_frame;
        self
    }

    pub fn stream_id(&self) -> u8 {
        self.stream_id
    }

    pub fn pts(&self) -> Option<u64> {
        self.pts
    }

    pub fn dts(&self) -> Option<u64> {
        self.dts
    }

    pub fn is_key_frame(&self) -> bool {
        self.is_key_frame
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Checks that the packet can be packetized.
    pub fn validate(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(TsError::MalformedPacket("empty payload".into()));
        }
        if self.stream_id < 0xbc {
            return Err(TsError::MalformedPacket(format!(
                "invalid stream id 0x{:02x}",
                self.stream_id
            )));
        }
        if self.dts.is_some() && self.pts.is_none() {
            return Err(TsError::MalformedPacket("dts without pts".into()));
        }
        // A zero PES_packet_length is only allowed for video in TS.
        if self.encoded_len() - 6 > MAX_PES_PACKET_LENGTH && !self.is_video() {
            return Err(TsError::MalformedPacket(format!(
                "{} bytes exceed the PES length field for stream id 0x{:02x}",
                self.encoded_len(),
                self.stream_id
            )));
        }
        Ok(())
    }

    fn is_video(&self) -> bool {
        (STREAM_ID_VIDEO..=STREAM_ID_VIDEO_MAX).contains(&self.stream_id)
    }

    /// Base for the PCR carried with this packet.
    pub fn pcr_base(&self) -> Option<u64> {
        self.dts.or(self.pts).map(|ts| ts & TIMESTAMP_MASK)
    }

    /// DTS is only written when it differs from PTS.
    fn written_dts(&self) -> Option<u64> {
        match (self.pts, self.dts) {
            (Some(pts), Some(dts)) if (pts ^ dts) & TIMESTAMP_MASK != 0 => Some(dts),
            _ => None,
        }
    }

    fn header_data_length(&self) -> usize {
        let mut len = 0;
        if self.pts.is_some() {
            len += PES_TIMESTAMP_SIZE;
        }
        if self.written_dts().is_some() {
            len += PES_TIMESTAMP_SIZE;
        }
        len
    }

    pub fn header_len(&self) -> usize {
        PES_FIXED_HEADER_SIZE + self.header_data_length()
    }

    /// Header plus payload, as it appears in the TS payloads.
    pub fn encoded_len(&self) -> usize {
        self.header_len() + self.data.len()
    }

    pub fn write_header<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&PES_START_CODE);
        buf.put_u8(self.stream_id);

        // Counts the bytes after the length field.
        let packet_length = self.encoded_len() - 6;
        if packet_length > MAX_PES_PACKET_LENGTH {
            buf.put_u16(0);
        } else {
            buf.put_u16(packet_length as u16);
        }

        buf.put_u8(PES_MARKER_FLAGS);

        let dts = self.written_dts();
        let mut flags = 0u8;
        if self.pts.is_some() {
            flags |= PTS_FLAG;
        }
        if dts.is_some() {
            flags |= DTS_FLAG;
        }
        buf.put_u8(flags);
        buf.put_u8(self.header_data_length() as u8);

        if let Some(pts) = self.pts {
            let prefix = if dts.is_some() {
                PTS_WITH_DTS_PREFIX
            } else {
                PTS_ONLY_PREFIX
            };
            write_timestamp(buf, prefix, pts);
        }
        if let Some(dts) = dts {
            write_timestamp(buf, DTS_PREFIX, dts);
        }
    }
}

/// 4-bit prefix, 33-bit timestamp split 3/15/15 with marker bits.
fn write_timestamp<B: BufMut>(buf: &mut B, prefix: u8, ts: u64) {
    let ts = ts & TIMESTAMP_MASK;
    buf.put_u8(prefix | (((ts >> 29) & 0x0e) as u8) | 0x01);
    buf.put_u16((((ts >> 14) & 0xfffe) | 0x01) as u16);
    buf.put_u16((((ts << 1) & 0xfffe) | 0x01) as u16);
}
