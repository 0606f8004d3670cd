pub mod text;

use crate::worker::job::{ConversionResult, ConversionTask};

pub use text::{transcode_to_utf8, TextConverter, TranscodeError, TranscodeStats, CHUNK_SIZE};

/// Turns one queued file into a [`ConversionResult`]. Implementations must
/// not propagate per-file faults; everything is reported through the result.
pub trait FileConverter: Send + Sync {
    fn convert(&self, task: &ConversionTask) -> ConversionResult;
}
