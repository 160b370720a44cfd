/// AAC AudioSpecificConfig parsing
pub mod aac;

pub use aac::AudioSpecificConfig;
