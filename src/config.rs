//! Writer configuration: transport stream identifiers, PIDs, PSI repetition
//! and output buffering.
//!
//! Configuration files use one `key = value` pair per line; `#` starts a
//! comment. Unknown keys are rejected.
//!
//! ```text
//! # tspackager configuration
//! pmt_pid = 0x20
//! elementary_pid = 0x50
//! psi_interval = 100
//! ```

use crate::error::{Result, TsError};
use crate::format::ts::types::{MAX_PID, PID_NULL, PID_PAT, TS_PACKET_SIZE};
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_PMT_PID: u16 = 0x20;
pub const DEFAULT_ELEMENTARY_PID: u16 = 0x50;
pub const DEFAULT_FLUSH_THRESHOLD: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsWriterConfig {
    pub transport_stream_id: u16,
    pub program_number: u16,
    pub pmt_pid: u16,
    pub elementary_pid: u16,
    /// Re-emit PAT/PMT before every Nth PES packet of a segment, in addition
    /// to the segment start. `None` emits once per segment.
    pub psi_interval: Option<usize>,
    /// Buffered TS bytes that trigger a write to the segment file.
    pub flush_threshold: usize,
}

impl Default for TsWriterConfig {
    fn default() -> Self {
        Self {
            transport_stream_id: 1,
            program_number: 1,
            pmt_pid: DEFAULT_PMT_PID,
            elementary_pid: DEFAULT_ELEMENTARY_PID,
            psi_interval: None,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl TsWriterConfig {
    /// Reads and validates a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        content.parse()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, pid) in [
            ("pmt_pid", self.pmt_pid),
            ("elementary_pid", self.elementary_pid),
        ] {
            if pid > MAX_PID || pid == PID_PAT || pid == PID_NULL {
                return Err(TsError::Config(format!("{} 0x{:04x} is not usable", name, pid)));
            }
        }
        if self.pmt_pid == self.elementary_pid {
            return Err(TsError::Config(format!(
                "pmt_pid and elementary_pid are both 0x{:04x}",
                self.pmt_pid
            )));
        }
        if self.program_number == 0 {
            return Err(TsError::Config(
                "program_number 0 is reserved for the network PID".into(),
            ));
        }
        if self.psi_interval == Some(0) {
            return Err(TsError::Config("psi_interval must be positive".into()));
        }
        if self.flush_threshold < TS_PACKET_SIZE {
            return Err(TsError::Config(format!(
                "flush_threshold {} is smaller than a TS packet",
                self.flush_threshold
            )));
        }
        Ok(())
    }
}

impl FromStr for TsWriterConfig {
    type Err = TsError;

    fn from_str(content: &str) -> Result<Self> {
        let mut config = TsWriterConfig::default();

        for (index, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                TsError::Config(format!("line {}: expected key = value", index + 1))
            })?;
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');

            match key {
                "transport_stream_id" => config.transport_stream_id = parse_number(key, value)?,
                "program_number" => config.program_number = parse_number(key, value)?,
                "pmt_pid" => config.pmt_pid = parse_number(key, value)?,
                "elementary_pid" => config.elementary_pid = parse_number(key, value)?,
                "psi_interval" => {
                    config.psi_interval = match value {
                        "" | "none" => None,
                        v => Some(parse_number::<u32>(key, v)? as usize),
                    }
                }
                "flush_threshold" => {
                    config.flush_threshold = parse_number::<u32>(key, value)? as usize
                }
                _ => {
                    return Err(TsError::Config(format!(
                        "line {}: unknown key {}",
                        index + 1,
                        key
                    )))
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

/// Decimal or `0x` prefixed hexadecimal.
fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: TryFrom<u64>,
{
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    }
    .map_err(|e| TsError::Config(format!("{}: {}", key, e)))?;

    T::try_from(parsed).map_err(|_| TsError::Config(format!("{}: {} out of range", key, value)))
}
