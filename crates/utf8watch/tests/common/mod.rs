pub mod harness;

pub use harness::{wait_until, TestHarness};
