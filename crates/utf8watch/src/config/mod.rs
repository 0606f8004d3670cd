pub mod loader;
pub mod schema;

pub use loader::{load_settings, load_settings_from};
pub use schema::{Settings, DEFAULT_MAX_WORKERS};
