use bytes::BufMut;

// Packet layout
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_MAX_PAYLOAD_SIZE: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;
pub const SYNC_BYTE: u8 = 0x47;
pub const STUFFING_BYTE: u8 = 0xff;

// Adaptation field layout
pub const ADAPTATION_FIELD_LENGTH_SIZE: usize = 1;
pub const ADAPTATION_FIELD_FLAGS_SIZE: usize = 1;
pub const PCR_SIZE: usize = 6;

// PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_NULL: u16 = 0x1fff;
pub const MAX_PID: u16 = 0x1fff;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

// Elementary stream types, clear
pub const STREAM_TYPE_MPEG1_AUDIO: u8 = 0x03;
pub const STREAM_TYPE_AAC: u8 = 0x0f;
pub const STREAM_TYPE_H264: u8 = 0x1b;
pub const STREAM_TYPE_H265: u8 = 0x24;
pub const STREAM_TYPE_AC3: u8 = 0x81;
pub const STREAM_TYPE_EAC3: u8 = 0x87;

// Elementary stream types, SAMPLE-AES encrypted
pub const STREAM_TYPE_ENCRYPTED_AC3: u8 = 0xc1;
pub const STREAM_TYPE_ENCRYPTED_EAC3: u8 = 0xc2;
pub const STREAM_TYPE_ENCRYPTED_AAC: u8 = 0xcf;
pub const STREAM_TYPE_ENCRYPTED_H264: u8 = 0xdb;

// PES stream IDs
pub const STREAM_ID_AUDIO: u8 = 0xc0;
pub const STREAM_ID_VIDEO: u8 = 0xe0;
pub const STREAM_ID_VIDEO_MAX: u8 = 0xef;
pub const STREAM_ID_PRIVATE_1: u8 = 0xbd;

pub const PTS_HZ: u64 = 90_000;
/// Timestamps and PCR bases are 33-bit values.
pub const TIMESTAMP_MASK: u64 = 0x1_ffff_ffff;

/// The four byte header that starts every TS packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsHeader {
    pub sync_byte: u8, // Always 0x47
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_exists: bool,
    pub contains_payload: bool,
    pub continuity_counter: u8,
}

impl Default for TsHeader {
    fn default() -> Self {
        Self {
            sync_byte: SYNC_BYTE,
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: 0,
            scrambling_control: 0,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: 0,
        }
    }
}

impl TsHeader {
    pub fn new(pid: u16, continuity_counter: u8) -> Self {
        Self {
            pid,
            continuity_counter,
            ..Default::default()
        }
    }

    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.sync_byte);

        let mut b1 = 0u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.transport_priority {
            b1 |= 0x20;
        }
        b1 |= ((self.pid >> 8) & 0x1f) as u8;
        buf.put_u8(b1);

        buf.put_u8((self.pid & 0xff) as u8);

        let mut b3 = (self.scrambling_control & 0x03) << 6;
        if self.adaptation_field_exists {
            b3 |= 0x20;
        }
        if self.contains_payload {
            b3 |= 0x10;
        }
        b3 |= self.continuity_counter & 0x0f;
        buf.put_u8(b3);
    }
}

/// Adaptation field content the writer can emit: random access signalling,
/// a PCR and stuffing up to a fixed payload size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdaptationField {
    pub random_access: bool,
    /// 33-bit PCR base in 90 kHz units; the 27 MHz extension is always 0.
    pub pcr_base: Option<u64>,
}

impl AdaptationField {
    /// True when the field carries flags, as opposed to stuffing only.
    pub fn has_flags(&self) -> bool {
        self.random_access || self.pcr_base.is_some()
    }

    /// Minimum adaptation field size in bytes, length byte included.
    pub fn min_size(&self) -> usize {
        if !self.has_flags() {
            return 0;
        }
        ADAPTATION_FIELD_LENGTH_SIZE
            + ADAPTATION_FIELD_FLAGS_SIZE
            + if self.pcr_base.is_some() { PCR_SIZE } else { 0 }
    }

    /// Writes the field so that exactly `payload_size` payload bytes complete
    /// the packet. `payload_size` must leave room for [`Self::min_size`] and
    /// be below [`TS_MAX_PAYLOAD_SIZE`].
    pub fn write_to<B: BufMut>(&self, buf: &mut B, payload_size: usize) {
        let total = TS_MAX_PAYLOAD_SIZE - payload_size;
        debug_assert!(total >= self.min_size().max(1));

        // A lone length byte of zero pads exactly one byte.
        if total == 1 && !self.has_flags() {
            buf.put_u8(0);
            return;
        }

        buf.put_u8((total - ADAPTATION_FIELD_LENGTH_SIZE) as u8);

        let mut flags = 0u8;
        if self.random_access {
            flags |= 0x40;
        }
        if self.pcr_base.is_some() {
            flags |= 0x10;
        }
        buf.put_u8(flags);

        let mut written = ADAPTATION_FIELD_LENGTH_SIZE + ADAPTATION_FIELD_FLAGS_SIZE;
        if let Some(base) = self.pcr_base {
            write_pcr(buf, base);
            written += PCR_SIZE;
        }

        buf.put_bytes(STUFFING_BYTE, total - written);
    }
}

/// 33-bit base, 6 reserved bits, 9-bit extension (always 0 here).
fn write_pcr<B: BufMut>(buf: &mut B, base: u64) {
    let base = base & TIMESTAMP_MASK;
    buf.put_u8((base >> 25) as u8);
    buf.put_u8((base >> 17) as u8);
    buf.put_u8((base >> 9) as u8);
    buf.put_u8((base >> 1) as u8);
    buf.put_u8((((base & 0x01) as u8) << 7) | 0x7e);
    buf.put_u8(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_layout() {
        let mut buf = BytesMut::new();
        let header = TsHeader {
            payload_unit_start: true,
            adaptation_field_exists: true,
            ..TsHeader::new(0x1abc, 0x1f)
        };
        header.write_to(&mut buf);

        // Counter is truncated to its nibble, PID to 13 bits.
        assert_eq!(&buf[..], &[0x47, 0x5a, 0xbc, 0x3f]);
    }

    #[test]
    fn test_single_byte_stuffing() {
        let mut buf = BytesMut::new();
        AdaptationField::default().write_to(&mut buf, TS_MAX_PAYLOAD_SIZE - 1);
        assert_eq!(&buf[..], &[0x00]);
    }

    #[test]
    fn test_stuffing_only() {
        let mut buf = BytesMut::new();
        AdaptationField::default().write_to(&mut buf, 180);
        assert_eq!(&buf[..], &[0x03, 0x00, 0xff, 0xff]);
    }

    #[test]
    fn test_pcr_with_random_access() {
        let mut buf = BytesMut::new();
        let field = AdaptationField {
            random_access: true,
            pcr_base: Some(0x1_2345_6789),
        };
        assert_eq!(field.min_size(), 8);
        field.write_to(&mut buf, TS_MAX_PAYLOAD_SIZE - 10);

        assert_eq!(
            &buf[..],
            &[0x09, 0x50, 0x91, 0xa2, 0xb3, 0xc4, 0xfe, 0x00, 0xff, 0xff]
        );
    }
}
