//! Packet-level inspection of written transport streams: headers,
//! adaptation fields and single-packet PSI sections.
//!
//! This is for checking what a [`TsWriter`](super::TsWriter) produced, not a
//! demuxer. There is no PES reassembly and no section spanning packets.

use super::psi::{Descriptor, ElementaryStreamInfo, Pat, PatEntry, Pmt};
use super::types::*;
use crate::error::{Result, TsError};
use crate::utils::Crc32Mpeg2;

/// Adaptation field as found in a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAdaptationField {
    /// Value of the adaptation_field_length byte.
    pub length: usize,
    pub discontinuity: bool,
    pub random_access: bool,
    /// 33-bit PCR base.
    pub pcr_base: Option<u64>,
    pub pcr_extension: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct ParsedPacket<'a> {
    pub header: TsHeader,
    pub adaptation_field: Option<ParsedAdaptationField>,
    pub payload: &'a [u8],
}

/// Long-form PSI section with a verified CRC.
#[derive(Debug, Clone)]
pub struct Section<'a> {
    pub table_id: u8,
    pub table_id_extension: u16,
    pub version: u8,
    pub current_next: bool,
    /// Bytes between last_section_number and the CRC.
    pub body: &'a [u8],
}

pub struct TsPacketParser {
    crc: Crc32Mpeg2,
}

impl Default for TsPacketParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TsPacketParser {
    pub fn new() -> Self {
        Self {
            crc: Crc32Mpeg2::new(),
        }
    }

    pub fn parse_header(&self, data: &[u8]) -> Result<TsHeader> {
        if data.len() < TS_HEADER_SIZE {
            return Err(TsError::Parser("TS packet too short".into()));
        }

        if data[0] != SYNC_BYTE {
            return Err(TsError::Parser("Invalid sync byte".into()));
        }

        Ok(TsHeader {
            sync_byte: data[0],
            transport_error: (data[1] & 0x80) != 0,
            payload_unit_start: (data[1] & 0x40) != 0,
            transport_priority: (data[1] & 0x20) != 0,
            pid: (((data[1] & 0x1F) as u16) << 8) | data[2] as u16,
            scrambling_control: (data[3] >> 6) & 0x03,
            adaptation_field_exists: (data[3] & 0x20) != 0,
            contains_payload: (data[3] & 0x10) != 0,
            continuity_counter: data[3] & 0x0F,
        })
    }

    pub fn parse_packet<'a>(&self, data: &'a [u8]) -> Result<ParsedPacket<'a>> {
        if data.len() != TS_PACKET_SIZE {
            return Err(TsError::Parser(format!(
                "TS packet of {} bytes",
                data.len()
            )));
        }
        let header = self.parse_header(data)?;

        let mut payload_start = TS_HEADER_SIZE;
        let adaptation_field = if header.adaptation_field_exists {
            let field = self.parse_adaptation_field(&data[TS_HEADER_SIZE..])?;
            payload_start += 1 + field.length;
            Some(field)
        } else {
            None
        };

        let payload = if header.contains_payload {
            &data[payload_start..]
        } else {
            &[]
        };

        Ok(ParsedPacket {
            header,
            adaptation_field,
            payload,
        })
    }

    /// `data` starts at the adaptation_field_length byte.
    pub fn parse_adaptation_field(&self, data: &[u8]) -> Result<ParsedAdaptationField> {
        let length = *data
            .first()
            .ok_or_else(|| TsError::Parser("Adaptation field missing".into()))?
            as usize;
        if length > TS_MAX_PAYLOAD_SIZE - 1 || data.len() < 1 + length {
            return Err(TsError::Parser("Adaptation field too long".into()));
        }

        let mut field = ParsedAdaptationField {
            length,
            discontinuity: false,
            random_access: false,
            pcr_base: None,
            pcr_extension: None,
        };
        if length == 0 {
            return Ok(field);
        }

        let flags = data[1];
        field.discontinuity = (flags & 0x80) != 0;
        field.random_access = (flags & 0x40) != 0;

        if (flags & 0x10) != 0 {
            if length < 1 + PCR_SIZE {
                return Err(TsError::Parser("PCR data too short".into()));
            }
            let pcr = &data[2..2 + PCR_SIZE];
            let base = ((pcr[0] as u64) << 25)
                | ((pcr[1] as u64) << 17)
                | ((pcr[2] as u64) << 9)
                | ((pcr[3] as u64) << 1)
                | ((pcr[4] >> 7) as u64);
            let extension = (((pcr[4] & 0x01) as u16) << 8) | pcr[5] as u16;
            field.pcr_base = Some(base);
            field.pcr_extension = Some(extension);
        }

        Ok(field)
    }

    /// Extracts the section starting in a payload_unit_start PSI payload.
    pub fn section_from_payload<'a>(&self, payload: &'a [u8]) -> Result<&'a [u8]> {
        let pointer = *payload
            .first()
            .ok_or_else(|| TsError::Parser("PSI payload is empty".into()))?
            as usize;
        let start = 1 + pointer;
        if payload.len() < start + 3 {
            return Err(TsError::Parser("PSI payload too short".into()));
        }
        let section_length =
            (((payload[start + 1] & 0x0f) as usize) << 8) | payload[start + 2] as usize;
        let end = start + 3 + section_length;
        if end > payload.len() {
            return Err(TsError::Parser("section continues in another packet".into()));
        }
        Ok(&payload[start..end])
    }

    pub fn parse_section<'a>(&self, section: &'a [u8]) -> Result<Section<'a>> {
        if section.len() < 12 {
            return Err(TsError::Parser("section too short".into()));
        }
        if section[1] & 0x80 == 0 {
            return Err(TsError::Parser("not a long-form section".into()));
        }
        let section_length = (((section[1] & 0x0f) as usize) << 8) | section[2] as usize;
        if section.len() != 3 + section_length {
            return Err(TsError::Parser("section length mismatch".into()));
        }
        if !self.crc.verify(section) {
            return Err(TsError::Parser("section CRC mismatch".into()));
        }

        Ok(Section {
            table_id: section[0],
            table_id_extension: ((section[3] as u16) << 8) | section[4] as u16,
            version: (section[5] >> 1) & 0x1f,
            current_next: (section[5] & 0x01) != 0,
            body: &section[8..section.len() - 4],
        })
    }

    pub fn parse_pat(&self, section: &[u8]) -> Result<Pat> {
        let section = self.parse_section(section)?;
        if section.table_id != TABLE_ID_PAT {
            return Err(TsError::Parser(format!(
                "table id 0x{:02x} is not a PAT",
                section.table_id
            )));
        }

        let entries = section
            .body
            .chunks_exact(4)
            .map(|entry| PatEntry {
                program_number: ((entry[0] as u16) << 8) | entry[1] as u16,
                program_map_pid: (((entry[2] & 0x1f) as u16) << 8) | entry[3] as u16,
            })
            .collect();

        Ok(Pat {
            transport_stream_id: section.table_id_extension,
            entries,
        })
    }

    pub fn parse_pmt(&self, section: &[u8]) -> Result<Pmt> {
        let section = self.parse_section(section)?;
        if section.table_id != TABLE_ID_PMT {
            return Err(TsError::Parser(format!(
                "table id 0x{:02x} is not a PMT",
                section.table_id
            )));
        }
        let data = section.body;
        if data.len() < 4 {
            return Err(TsError::Parser("PMT too short".into()));
        }

        let mut pmt = Pmt {
            program_number: section.table_id_extension,
            version: section.version,
            pcr_pid: (((data[0] & 0x1f) as u16) << 8) | data[1] as u16,
            ..Default::default()
        };

        let program_info_length = (((data[2] & 0x0f) as usize) << 8) | data[3] as usize;
        let mut pos = 4;
        if pos + program_info_length > data.len() {
            return Err(TsError::Parser("Program info data too short".into()));
        }
        pmt.program_descriptors = parse_descriptors(&data[pos..pos + program_info_length])?;
        pos += program_info_length;

        while pos + 5 <= data.len() {
            let stream_type = data[pos];
            let elementary_pid = (((data[pos + 1] & 0x1f) as u16) << 8) | data[pos + 2] as u16;
            let es_info_length = (((data[pos + 3] & 0x0f) as usize) << 8) | data[pos + 4] as usize;
            pos += 5;

            if pos + es_info_length > data.len() {
                return Err(TsError::Parser("ES info data too short".into()));
            }
            let descriptors = parse_descriptors(&data[pos..pos + es_info_length])?;
            pos += es_info_length;

            pmt.elementary_stream_infos.push(ElementaryStreamInfo {
                stream_type,
                elementary_pid,
                descriptors,
            });
        }

        Ok(pmt)
    }
}

fn parse_descriptors(data: &[u8]) -> Result<Vec<Descriptor>> {
    let mut descriptors = Vec::new();
    let mut pos = 0;

    while pos + 2 <= data.len() {
        let tag = data[pos];
        let length = data[pos + 1] as usize;
        pos += 2;

        if pos + length > data.len() {
            return Err(TsError::Parser("Descriptor data too short".into()));
        }

        descriptors.push(Descriptor {
            tag,
            data: data[pos..pos + length].to_vec(),
        });
        pos += length;
    }

    Ok(descriptors)
}
