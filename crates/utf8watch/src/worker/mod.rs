pub mod job;
pub mod pool;
pub mod scanner;

pub use job::{ConversionResult, ConversionTask};
pub use pool::{CompletionCallback, JobHandle, WorkerPool};
pub use scanner::DirectoryScanner;
