//! Packetization of PES packets and PSI sections into 188-byte TS packets.
//!
//! Both functions append only whole packets to the output buffer and stamp
//! each packet with the next value of the given continuity counter.

use super::continuity::ContinuityCounter;
use super::pes::PesPacket;
use super::types::*;
use bytes::{BufMut, BytesMut};

/// Splits `pes` (header and payload) into TS packets on `pid`.
///
/// The first packet sets payload_unit_start and carries an adaptation field
/// with the PCR (from DTS, or PTS) and the random access indicator for key
/// frames. The last packet is padded with adaptation-field stuffing.
/// Returns the number of TS packets written.
pub fn write_pes_packets(
    pes: &PesPacket,
    pid: u16,
    counter: &mut ContinuityCounter,
    out: &mut BytesMut,
) -> usize {
    let mut payload = BytesMut::with_capacity(pes.encoded_len());
    pes.write_header(&mut payload);
    payload.extend_from_slice(pes.data());

    let packets = payload.len().div_ceil(TS_MAX_PAYLOAD_SIZE) + 1;
    out.reserve(packets * TS_PACKET_SIZE);

    let mut adaptation_field = AdaptationField {
        random_access: pes.is_key_frame(),
        pcr_base: pes.pcr_base(),
    };
    let mut payload_unit_start = true;
    let mut offset = 0;
    let mut written = 0;

    while offset < payload.len() {
        let capacity = TS_MAX_PAYLOAD_SIZE - adaptation_field.min_size();
        let chunk = (payload.len() - offset).min(capacity);
        let needs_adaptation_field = adaptation_field.has_flags() || chunk < TS_MAX_PAYLOAD_SIZE;

        let header = TsHeader {
            payload_unit_start,
            adaptation_field_exists: needs_adaptation_field,
            ..TsHeader::new(pid, counter.get_next())
        };
        header.write_to(out);
        if needs_adaptation_field {
            adaptation_field.write_to(out, chunk);
        }
        out.put_slice(&payload[offset..offset + chunk]);

        offset += chunk;
        written += 1;
        payload_unit_start = false;
        adaptation_field = AdaptationField::default();
    }

    log::trace!(
        "packetized pes stream_id=0x{:02x} bytes={} into {} ts packets on pid 0x{:04x}",
        pes.stream_id(),
        payload.len(),
        written,
        pid
    );
    written
}

/// Wraps a complete PSI section into TS packets on `pid`.
///
/// The first packet carries a zero pointer field; the tail of the last packet
/// is filled with 0xFF section stuffing. Returns the number of TS packets
/// written.
pub fn write_psi_packets(
    section: &[u8],
    pid: u16,
    counter: &mut ContinuityCounter,
    out: &mut BytesMut,
) -> usize {
    let mut offset = 0;
    let mut written = 0;

    while offset < section.len() || written == 0 {
        let first = written == 0;
        TsHeader {
            payload_unit_start: first,
            ..TsHeader::new(pid, counter.get_next())
        }
        .write_to(out);

        let mut room = TS_MAX_PAYLOAD_SIZE;
        if first {
            out.put_u8(0); // pointer_field
            room -= 1;
        }

        let chunk = (section.len() - offset).min(room);
        out.put_slice(&section[offset..offset + chunk]);
        out.put_bytes(STUFFING_BYTE, room - chunk);

        offset += chunk;
        written += 1;
    }

    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn counters(out: &[u8]) -> Vec<u8> {
        out.chunks(TS_PACKET_SIZE).map(|p| p[3] & 0x0f).collect()
    }

    #[test]
    fn test_small_pes_fits_one_packet() {
        let pes = PesPacket::audio(vec![0x11; 20]);
        let mut counter = ContinuityCounter::new();
        let mut out = BytesMut::new();

        assert_eq!(write_pes_packets(&pes, 0x50, &mut counter, &mut out), 1);
        assert_eq!(out.len(), TS_PACKET_SIZE);
        assert_eq!(&out[..4], &[0x47, 0x40, 0x50, 0x30]);
        // 184 - 29 bytes of PES leave 155 bytes of adaptation field.
        assert_eq!(out[4], 154);
        assert_eq!(out[5], 0x00);
        assert!(out[6..159].iter().all(|&b| b == 0xff));
        assert_eq!(&out[159..162], &[0x00, 0x00, 0x01]);
        assert_eq!(&out[168..], &[0x11; 20][..]);
        assert_eq!(counter.peek(), 1);
    }

    #[test]
    fn test_first_packet_carries_pcr_and_random_access() {
        let pes = PesPacket::video(vec![0x22; 400])
            .with_pts(1800)
            .with_dts(900)
            .with_key_frame(true);
        let mut counter = ContinuityCounter::new();
        let mut out = BytesMut::new();

        // 419 bytes: 176 + 184 + 59
        assert_eq!(write_pes_packets(&pes, 0x50, &mut counter, &mut out), 3);
        assert_eq!(counters(&out), vec![0, 1, 2]);

        let first = &out[..TS_PACKET_SIZE];
        assert_eq!(first[1] & 0x40, 0x40);
        assert_eq!(first[3] & 0x30, 0x30);
        assert_eq!(&first[4..6], &[0x07, 0x50]);
        assert_eq!(&first[12..15], &[0x00, 0x00, 0x01]);

        let second = &out[TS_PACKET_SIZE..2 * TS_PACKET_SIZE];
        assert_eq!(second[1] & 0x40, 0);
        assert_eq!(second[3] & 0x30, 0x10);

        let third = &out[2 * TS_PACKET_SIZE..];
        assert_eq!(third[3] & 0x30, 0x30);
        assert_eq!(third[4] as usize, TS_MAX_PAYLOAD_SIZE - 59 - 1);
    }

    #[test]
    fn test_one_byte_short_uses_empty_adaptation_field() {
        // 9 byte header + 174 bytes = 183
        let pes = PesPacket::audio(vec![0x33; 174]);
        let mut counter = ContinuityCounter::new();
        let mut out = BytesMut::new();

        assert_eq!(write_pes_packets(&pes, 0x50, &mut counter, &mut out), 1);
        assert_eq!(out[3] & 0x30, 0x30);
        assert_eq!(out[4], 0x00);
        assert_eq!(&out[5..8], &[0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_exact_fit_has_no_adaptation_field() {
        let pes = PesPacket::audio(vec![0x44; 175]);
        let mut counter = ContinuityCounter::new();
        let mut out = BytesMut::new();

        assert_eq!(write_pes_packets(&pes, 0x50, &mut counter, &mut out), 1);
        assert_eq!(out[3] & 0x30, 0x10);
        assert_eq!(&out[4..7], &[0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_psi_single_packet() {
        let section = [0x00, 0xb0, 0x0d, 0x00, 0x01];
        let mut counter = ContinuityCounter::new();
        counter.get_next();
        let mut out = BytesMut::new();

        assert_eq!(write_psi_packets(&section, PID_PAT, &mut counter, &mut out), 1);
        assert_eq!(out.len(), TS_PACKET_SIZE);
        assert_eq!(&out[..10], &[0x47, 0x40, 0x00, 0x11, 0x00, 0x00, 0xb0, 0x0d, 0x00, 0x01]);
        assert!(out[10..].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_psi_spanning_packets() {
        let section = vec![0x5a; 300];
        let mut counter = ContinuityCounter::new();
        let mut out = BytesMut::new();

        assert_eq!(write_psi_packets(&section, 0x20, &mut counter, &mut out), 2);
        assert_eq!(counters(&out), vec![0, 1]);
        assert_eq!(out[1], 0x40);
        assert_eq!(out[TS_PACKET_SIZE + 1], 0x00);
        // 183 bytes in the first packet, 117 in the second.
        assert_eq!(out[TS_PACKET_SIZE + 4 + 116], 0x5a);
        assert_eq!(out[TS_PACKET_SIZE + 4 + 117], 0xff);
    }
}
