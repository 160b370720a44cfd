use super::types::{AudioObjectType, AudioSpecificConfig, EXPLICIT_FREQUENCY_INDEX, SAMPLE_RATES};
use crate::utils::BitReader;
use crate::{Result, TsError};

impl AudioSpecificConfig {
    /// Parses an AudioSpecificConfig as carried in the esds box or
    /// in the `codec_config` of an audio stream.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(TsError::Parser(format!(
                "AudioSpecificConfig too short: {} bytes",
                data.len()
            )));
        }

        let mut reader = BitReader::new(data);

        let mut object_type = read_object_type(&mut reader)?;
        let sample_rate = read_sample_rate(&mut reader)?;
        let channel_configuration = reader.read_bits(4)? as u8;
        if channel_configuration > 7 {
            return Err(TsError::Parser(format!(
                "invalid channel configuration {}",
                channel_configuration
            )));
        }

        let mut extension_sample_rate = None;
        let mut extension_object_type = None;
        if matches!(object_type, AudioObjectType::SBR | AudioObjectType::PS) {
            extension_object_type = Some(object_type);
            extension_sample_rate = Some(read_sample_rate(&mut reader)?);
            object_type = read_object_type(&mut reader)?;
        }

        if object_type == AudioObjectType::Other(0) {
            return Err(TsError::Parser("null audio object type".into()));
        }

        Ok(Self {
            object_type,
            sample_rate,
            channel_configuration,
            extension_sample_rate,
            extension_object_type,
        })
    }
}

fn read_object_type(reader: &mut BitReader) -> Result<AudioObjectType> {
    let mut object_type = reader.read_bits(5)? as u8;
    if object_type == 31 {
        object_type = 32 + reader.read_bits(6)? as u8;
    }
    Ok(AudioObjectType::from(object_type))
}

fn read_sample_rate(reader: &mut BitReader) -> Result<u32> {
    let index = reader.read_bits(4)? as u8;
    if index == EXPLICIT_FREQUENCY_INDEX {
        return reader.read_bits(24);
    }
    SAMPLE_RATES
        .get(index as usize)
        .copied()
        .ok_or_else(|| TsError::Parser(format!("reserved sampling frequency index {}", index)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aac_lc() {
        // AAC-LC, 44.1 kHz, stereo
        let config = AudioSpecificConfig::parse(&[0x12, 0x10]).unwrap();

        assert_eq!(config.object_type, AudioObjectType::LC);
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.channel_configuration, 2);
        assert_eq!(config.channels(), 2);
        assert_eq!(config.extension_sample_rate, None);
        assert_eq!(config.extension_object_type, None);
    }

    #[test]
    fn test_parse_he_aac() {
        // SBR, 24 kHz core, mono, 48 kHz extension, LC core
        // 00101 0110 0001 0011 00010 000
        let config = AudioSpecificConfig::parse(&[0x2B, 0x09, 0x88, 0x00]).unwrap();

        assert_eq!(config.object_type, AudioObjectType::LC);
        assert_eq!(config.sample_rate, 24_000);
        assert_eq!(config.channel_configuration, 1);
        assert_eq!(config.extension_sample_rate, Some(48_000));
        assert_eq!(config.extension_object_type, Some(AudioObjectType::SBR));
    }

    #[test]
    fn test_parse_he_aac_v2() {
        // PS, 24 kHz core, mono, 48 kHz extension, LC core
        // 11101 0110 0001 0011 00010 000
        let config = AudioSpecificConfig::parse(&[0xEB, 0x09, 0x88]).unwrap();

        assert_eq!(config.object_type, AudioObjectType::LC);
        assert_eq!(config.extension_object_type, Some(AudioObjectType::PS));
        assert_eq!(config.extension_sample_rate, Some(48_000));
    }

    #[test]
    fn test_parse_explicit_frequency() {
        // LC, index 15, 24-bit frequency 0x00AC44 (44100), stereo
        // 00010 1111 000000001010110001000100 0010 000
        let config = AudioSpecificConfig::parse(&[0x17, 0x80, 0x56, 0x22, 0x10]).unwrap();

        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.channel_configuration, 2);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(AudioSpecificConfig::parse(&[]).is_err());
        assert!(AudioSpecificConfig::parse(&[0x12]).is_err());
        // Reserved sampling frequency index 13
        assert!(AudioSpecificConfig::parse(&[0x16, 0x90]).is_err());
        // Null object type
        assert!(AudioSpecificConfig::parse(&[0x02, 0x10]).is_err());
    }
}
