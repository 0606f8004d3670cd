use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use encoding_rs::{CoderResult, UTF_8};
use log::{debug, error, warn};
use thiserror::Error;
use tracing::debug_span;

use crate::converter::FileConverter;
use crate::error::ConvertError;
use crate::storage::archive_into;
use crate::worker::job::{ConversionResult, ConversionTask};

/// Size of each read from the source file.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Suffix appended to the source file stem to name the output file.
pub const OUTPUT_SUFFIX: &str = "_utf8_converted.txt";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    pub bytes_read: usize,
    pub bytes_written: usize,
    /// True when at least one malformed sequence was replaced with U+FFFD.
    pub replaced: bool,
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Failed to read input: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write output: {0}")]
    Write(#[source] io::Error),
}

/// Streams `reader` into `writer` as UTF-8, replacing malformed sequences
/// with U+FFFD. Memory use is bounded by [`CHUNK_SIZE`] regardless of input
/// length. A byte order mark is passed through untouched.
pub fn transcode_to_utf8<R: Read, W: Write>(
    mut reader: R,
    writer: &mut W,
) -> Result<TranscodeStats, TranscodeError> {
    let mut decoder = UTF_8.new_decoder_without_bom_handling();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut text = String::new();
    let mut stats = TranscodeStats::default();

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TranscodeError::Read(e)),
        };
        let last = read == 0;
        let mut pending = &buffer[..read];

        loop {
            let worst_case = decoder
                .max_utf8_buffer_length(pending.len())
                .unwrap_or(CHUNK_SIZE * 3);
            text.reserve(worst_case);

            let (result, consumed, replaced) = decoder.decode_to_string(pending, &mut text, last);
            stats.replaced |= replaced;
            pending = &pending[consumed..];

            writer
                .write_all(text.as_bytes())
                .map_err(TranscodeError::Write)?;
            stats.bytes_written += text.len();
            text.clear();

            if matches!(result, CoderResult::InputEmpty) {
                break;
            }
        }

        stats.bytes_read += read;
        if last {
            break;
        }
    }

    Ok(stats)
}

/// Output of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub output_path: PathBuf,
    pub archive_path: PathBuf,
    pub stats: TranscodeStats,
}

pub struct TextConverter {
    output_directory: PathBuf,
    processed_directory: PathBuf,
}

impl TextConverter {
    pub fn new<O: AsRef<Path>, P: AsRef<Path>>(output_directory: O, processed_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
            processed_directory: processed_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn processed_directory(&self) -> &Path {
        &self.processed_directory
    }

    /// A file qualifies when its name ends in `.txt` and its guessed MIME type
    /// is `text/plain`.
    pub fn is_text_file(path: &Path) -> bool {
        let has_suffix = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(".txt"))
            .unwrap_or(false);

        has_suffix && mime_guess::from_path(path).first_raw() == Some("text/plain")
    }

    /// Path the converted copy of `source` is written to.
    pub fn output_path_for(&self, source: &Path) -> Option<PathBuf> {
        let stem = source.file_stem()?.to_str()?;
        Some(self.output_directory.join(format!("{}{}", stem, OUTPUT_SUFFIX)))
    }

    /// Converts `source` and reports only whether it succeeded. Failures are
    /// logged, never raised.
    pub fn convert_file<P: AsRef<Path>>(&self, source: P) -> bool {
        let task = ConversionTask::new(source.as_ref());
        self.convert(&task).success
    }

    /// Converts `source` into the output directory, then moves it into the
    /// processed directory. On error no output file is left behind and the
    /// source stays where it was.
    pub fn try_convert(&self, source: &Path) -> Result<ConvertedFile, ConvertError> {
        if !Self::is_text_file(source) {
            return Err(ConvertError::UnsupportedFile(source.to_path_buf()));
        }

        let output_path = self
            .output_path_for(source)
            .ok_or_else(|| ConvertError::UnsupportedFile(source.to_path_buf()))?;

        let stats = self.write_output(source, &output_path)?;
        debug!(
            "File {} successfully converted and saved as {}.",
            source.display(),
            output_path.display()
        );

        let archive_path = match archive_into(source, &self.processed_directory) {
            Ok(path) => path,
            Err(e) => {
                let _ = std::fs::remove_file(&output_path);
                return Err(e.into());
            }
        };
        debug!(
            "Original file {} moved to {}.",
            source.display(),
            archive_path.display()
        );

        Ok(ConvertedFile {
            output_path,
            archive_path,
            stats,
        })
    }

    // Writes into a hidden sibling first so a reader of the output directory
    // never sees a half-written file under the final name.
    fn write_output(&self, source: &Path, output_path: &Path) -> Result<TranscodeStats, ConvertError> {
        let partial_path = partial_path_for(output_path);

        let reader = File::open(source).map_err(|e| ConvertError::Read {
            path: source.to_path_buf(),
            source: e,
        })?;
        let file = File::create(&partial_path).map_err(|e| ConvertError::Write {
            path: partial_path.clone(),
            source: e,
        })?;

        let result = stream_into(reader, file, source, &partial_path)
            .and_then(|stats| {
                std::fs::rename(&partial_path, output_path).map_err(|e| ConvertError::Write {
                    path: output_path.to_path_buf(),
                    source: e,
                })?;
                Ok(stats)
            });

        if result.is_err() {
            let _ = std::fs::remove_file(&partial_path);
        }
        result
    }
}

fn stream_into(
    reader: File,
    file: File,
    source: &Path,
    partial_path: &Path,
) -> Result<TranscodeStats, ConvertError> {
    let write_error = |e: io::Error| ConvertError::Write {
        path: partial_path.to_path_buf(),
        source: e,
    };

    let mut writer = BufWriter::new(file);
    let stats = transcode_to_utf8(reader, &mut writer).map_err(|e| match e {
        TranscodeError::Read(e) => ConvertError::Read {
            path: source.to_path_buf(),
            source: e,
        },
        TranscodeError::Write(e) => write_error(e),
    })?;
    writer.flush().map_err(write_error)?;

    Ok(stats)
}

fn partial_path_for(output_path: &Path) -> PathBuf {
    let name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_path.with_file_name(format!(".{}.partial", name))
}

impl FileConverter for TextConverter {
    fn convert(&self, task: &ConversionTask) -> ConversionResult {
        let path = &task.source_path;
        let _span = debug_span!("convert", path = %path.display()).entered();

        match self.try_convert(path) {
            Ok(converted) => {
                if converted.stats.replaced {
                    debug!(
                        "Replaced malformed byte sequences while converting {}",
                        path.display()
                    );
                }
                ConversionResult::success(task, converted.output_path, converted.archive_path)
            }
            Err(e @ ConvertError::UnsupportedFile(_)) => {
                warn!("File {} is not a supported text file.", path.display());
                ConversionResult::failure(task, e.to_string())
            }
            Err(e) => {
                error!("Error converting file {}: {}", path.display(), e);
                ConversionResult::failure(task, e.to_string())
            }
        }
    }
}
