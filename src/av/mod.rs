//! Stream descriptions handed to the TS writer by the upstream demuxer.

use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    H264,
    H265,
    AAC,
    AC3,
    EAC3,
    MP3,
    OPUS,
    VP9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Text,
}

impl CodecType {
    pub fn kind(&self) -> StreamKind {
        match self {
            CodecType::H264 | CodecType::H265 | CodecType::VP9 => StreamKind::Video,
            CodecType::AAC
            | CodecType::AC3
            | CodecType::EAC3
            | CodecType::MP3
            | CodecType::OPUS => StreamKind::Audio,
        }
    }
}

/// Video stream parameters.
#[derive(Debug, Clone)]
pub struct VideoStreamInfo {
    pub codec: CodecType,
    /// Ticks per second of the stream timestamps.
    pub time_scale: u32,
    pub width: u32,
    pub height: u32,
    /// Decoder configuration record (avcC / hvcC), if any.
    pub codec_config: Bytes,
}

/// Audio stream parameters.
#[derive(Debug, Clone)]
pub struct AudioStreamInfo {
    pub codec: CodecType,
    pub time_scale: u32,
    pub sample_rate: u32,
    pub channels: u8,
    /// Codec configuration, e.g. the AAC AudioSpecificConfig. Carried in the
    /// encrypted PMT as audio setup data.
    pub codec_config: Bytes,
}

/// Timed text stream parameters. TS output does not carry text streams.
#[derive(Debug, Clone)]
pub struct TextStreamInfo {
    pub codec_string: String,
    pub time_scale: u32,
}

/// Immutable description of the single elementary stream a writer packages.
#[derive(Debug, Clone)]
pub enum StreamInfo {
    Video(VideoStreamInfo),
    Audio(AudioStreamInfo),
    Text(TextStreamInfo),
}

impl StreamInfo {
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamInfo::Video(_) => StreamKind::Video,
            StreamInfo::Audio(_) => StreamKind::Audio,
            StreamInfo::Text(_) => StreamKind::Text,
        }
    }

    pub fn codec(&self) -> Option<CodecType> {
        match self {
            StreamInfo::Video(info) => Some(info.codec),
            StreamInfo::Audio(info) => Some(info.codec),
            StreamInfo::Text(_) => None,
        }
    }

    pub fn time_scale(&self) -> u32 {
        match self {
            StreamInfo::Video(info) => info.time_scale,
            StreamInfo::Audio(info) => info.time_scale,
            StreamInfo::Text(info) => info.time_scale,
        }
    }

    pub fn codec_config(&self) -> &[u8] {
        match self {
            StreamInfo::Video(info) => &info.codec_config,
            StreamInfo::Audio(info) => &info.codec_config,
            StreamInfo::Text(_) => &[],
        }
    }
}

impl VideoStreamInfo {
    pub fn new(codec: CodecType, width: u32, height: u32) -> Self {
        Self {
            codec,
            time_scale: 90_000,
            width,
            height,
            codec_config: Bytes::new(),
        }
    }

    pub fn with_time_scale(mut self, time_scale: u32) -> Self {
        self.time_scale = time_scale;
        self
    }

    pub fn with_codec_config(mut self, config: impl Into<Bytes>) -> Self {
        self.codec_config = config.into();
        self
    }
}

impl AudioStreamInfo {
    pub fn new(codec: CodecType, sample_rate: u32, channels: u8) -> Self {
        Self {
            codec,
            time_scale: 90_000,
            sample_rate,
            channels,
            codec_config: Bytes::new(),
        }
    }

    pub fn with_time_scale(mut self, time_scale: u32) -> Self {
        self.time_scale = time_scale;
        self
    }

    pub fn with_codec_config(mut self, config: impl Into<Bytes>) -> Self {
        self.codec_config = config.into();
        self
    }
}

impl From<VideoStreamInfo> for StreamInfo {
    fn from(info: VideoStreamInfo) -> Self {
        StreamInfo::Video(info)
    }
}

impl From<AudioStreamInfo> for StreamInfo {
    fn from(info: AudioStreamInfo) -> Self {
        StreamInfo::Audio(info)
    }
}
