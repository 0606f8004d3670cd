use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Serialized};
use figment::value::Value;
use figment::Figment;

use crate::config::schema::{
    RawSettings, Settings, INPUT_DIRECTORY, MAX_WORKERS, OUTPUT_DIRECTORY, WATCH_POLL_INTERVAL_MS,
};
use crate::error::ConfigError;

/// Dotenv file read from the working directory, if present.
pub const ENV_FILE: &str = ".env";

const KEYS: [&str; 4] = [
    INPUT_DIRECTORY,
    OUTPUT_DIRECTORY,
    MAX_WORKERS,
    WATCH_POLL_INTERVAL_MS,
];

/// Loads settings from `./.env` and the process environment. A variable set
/// in the environment wins over the same key in the file.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(env_file_provider(Path::new(ENV_FILE))?)
        .merge(environment_provider());
    load_settings_from(&figment)
}

fn environment_provider() -> Serialized<BTreeMap<String, Value>> {
    let env = Env::raw().only(&KEYS);
    let pairs = env
        .iter()
        .map(|(key, value)| (key.as_str().to_string(), value));
    Serialized::defaults(settings_values(pairs))
}

fn env_file_provider(path: &Path) -> Result<Serialized<BTreeMap<String, Value>>, ConfigError> {
    let env_file_error = |source: dotenvy::Error| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    };

    let pairs = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter
            .collect::<Result<Vec<_>, _>>()
            .map_err(env_file_error)?,
        Err(e) if e.not_found() => Vec::new(),
        Err(e) => return Err(env_file_error(e)),
    };

    Ok(Serialized::defaults(settings_values(pairs)))
}

// Directory values stay raw strings: `2024` or `[inbox]` is a valid folder
// name. The numeric keys get figment's usual typed parsing.
fn settings_values<I>(pairs: I) -> BTreeMap<String, Value>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut values = BTreeMap::new();

    for (key, raw) in pairs {
        let Some(known) = KEYS.iter().find(|k| k.eq_ignore_ascii_case(key.trim())) else {
            continue;
        };

        let value = if *known == INPUT_DIRECTORY || *known == OUTPUT_DIRECTORY {
            Value::from(raw)
        } else {
            match raw.parse::<Value>() {
                Ok(value) => value,
                Err(never) => match never {},
            }
        };
        values.insert(known.to_ascii_lowercase(), value);
    }

    values
}

/// Loads settings from any figment provider stack. Keys are the lowercase
/// forms of the environment names (`input_directory`, `max_workers`, ...).
pub fn load_settings_from(figment: &Figment) -> Result<Settings, ConfigError> {
    let raw: RawSettings = figment.extract().map_err(Box::new)?;

    let input_directory = required(raw.input_directory, INPUT_DIRECTORY)?;
    let output_directory = required(raw.output_directory, OUTPUT_DIRECTORY)?;

    if input_directory == output_directory {
        return Err(ConfigError::Validation {
            message: format!("{} and {} must differ", INPUT_DIRECTORY, OUTPUT_DIRECTORY),
        });
    }

    if raw.max_workers == 0 {
        return Err(ConfigError::Validation {
            message: format!("{} must be at least 1", MAX_WORKERS),
        });
    }

    let watch_poll_interval = match raw.watch_poll_interval_ms {
        Some(0) => {
            return Err(ConfigError::Validation {
                message: format!("{} must be greater than 0", WATCH_POLL_INTERVAL_MS),
            })
        }
        Some(ms) => Some(Duration::from_millis(ms)),
        None => None,
    };

    Ok(Settings {
        input_directory,
        output_directory,
        max_workers: raw.max_workers,
        watch_poll_interval,
    })
}

// Empty values count as unset.
fn required(value: Option<PathBuf>, key: &'static str) -> Result<PathBuf, ConfigError> {
    match value {
        Some(path) if !path.as_os_str().is_empty() => Ok(path),
        _ => Err(ConfigError::MissingVariable(key)),
    }
}
