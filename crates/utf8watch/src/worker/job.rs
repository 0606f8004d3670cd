use std::path::{Path, PathBuf};

/// One file awaiting conversion. A task is identified only by its path; the
/// same path queued twice yields two independent tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub source_path: PathBuf,
}

impl ConversionTask {
    pub fn new<P: AsRef<Path>>(source_path: P) -> Self {
        Self {
            source_path: source_path.as_ref().to_path_buf(),
        }
    }
}

impl From<PathBuf> for ConversionTask {
    fn from(source_path: PathBuf) -> Self {
        Self { source_path }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub source_path: PathBuf,
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl ConversionResult {
    pub fn success(task: &ConversionTask, output_path: PathBuf, archive_path: PathBuf) -> Self {
        Self {
            source_path: task.source_path.clone(),
            success: true,
            output_path: Some(output_path),
            archive_path: Some(archive_path),
            error: None,
        }
    }

    pub fn failure(task: &ConversionTask, error: String) -> Self {
        Self {
            source_path: task.source_path.clone(),
            success: false,
            output_path: None,
            archive_path: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new() {
        let task = ConversionTask::new("/in/document.txt");
        assert_eq!(task.source_path, PathBuf::from("/in/document.txt"));
    }

    #[test]
    fn test_same_path_twice_is_two_equal_tasks() {
        let first = ConversionTask::from(PathBuf::from("/in/a.txt"));
        let second = ConversionTask::new("/in/a.txt");
        assert_eq!(first, second);
    }

    #[test]
    fn test_result_success() {
        let task = ConversionTask::new("/in/doc.txt");
        let result = ConversionResult::success(
            &task,
            PathBuf::from("/out/doc_utf8_converted.txt"),
            PathBuf::from("/in/processed/doc.txt"),
        );

        assert!(result.success);
        assert_eq!(result.source_path, task.source_path);
        assert!(result.output_path.is_some());
        assert!(result.archive_path.is_some());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_result_failure() {
        let task = ConversionTask::new("/in/doc.bin");
        let result = ConversionResult::failure(&task, "Test error".to_string());

        assert!(!result.success);
        assert!(result.output_path.is_none());
        assert!(result.archive_path.is_none());
        assert_eq!(result.error, Some("Test error".to_string()));
    }
}
