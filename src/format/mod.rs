pub mod ts;

pub use self::ts::{SegmentPipeline, TsWriter};
