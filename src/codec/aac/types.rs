/// MPEG-4 audio object types that matter for packaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioObjectType {
    Main,
    LC,
    SSR,
    LTP,
    /// Spectral band replication (HE-AAC).
    SBR,
    /// Parametric stereo (HE-AACv2).
    PS,
    Other(u8),
}

impl From<u8> for AudioObjectType {
    fn from(value: u8) -> Self {
        match value {
            1 => AudioObjectType::Main,
            2 => AudioObjectType::LC,
            3 => AudioObjectType::SSR,
            4 => AudioObjectType::LTP,
            5 => AudioObjectType::SBR,
            29 => AudioObjectType::PS,
            n => AudioObjectType::Other(n),
        }
    }
}

impl AudioObjectType {
    pub fn as_u8(&self) -> u8 {
        match self {
            AudioObjectType::Main => 1,
            AudioObjectType::LC => 2,
            AudioObjectType::SSR => 3,
            AudioObjectType::LTP => 4,
            AudioObjectType::SBR => 5,
            AudioObjectType::PS => 29,
            AudioObjectType::Other(n) => *n,
        }
    }
}

/// Sampling frequencies addressed by `samplingFrequencyIndex`.
pub const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Escape value of `samplingFrequencyIndex`: a 24-bit frequency follows.
pub const EXPLICIT_FREQUENCY_INDEX: u8 = 0x0f;

/// Parsed ISO/IEC 14496-3 AudioSpecificConfig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    pub object_type: AudioObjectType,
    pub sample_rate: u32,
    pub channel_configuration: u8,
    /// Output sample rate after SBR, when signalled explicitly.
    pub extension_sample_rate: Option<u32>,
    /// `SBR` or `PS` when the config signals HE-AAC explicitly;
    /// `object_type` then holds the core codec.
    pub extension_object_type: Option<AudioObjectType>,
}

impl AudioSpecificConfig {
    /// Number of output channels; 0 when a program config element is required.
    pub fn channels(&self) -> u8 {
        match self.channel_configuration {
            7 => 8,
            n => n,
        }
    }
}
