pub mod filesystem;
pub mod layout;

pub use filesystem::{archive_into, ensure_directory, move_file};
pub use layout::Directories;
