//! Configuration management for the ticket archive
//!
//! Values are read from the process environment first, then from a `.env`
//! file in the working directory. Command-line flags override both.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Page sizes the listing accepts; anything else falls back to the default.
pub const ALLOWED_PAGE_SIZES: &[usize] = &[10, 20, 25, 50, 100];

/// Main configuration struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Target `SQLite` store.
    pub database_path: PathBuf,
    /// Where `ta migrate` looks for exports when no input is given.
    pub input_dir: PathBuf,
    pub default_per_page: usize,
    pub vacuum_after_migrate: bool,
    /// Names recognized at the start of a signature block.
    pub signature_agent_names: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/tickets.db"),
            input_dir: PathBuf::from("data"),
            default_per_page: 20,
            vacuum_after_migrate: false,
            signature_agent_names: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_value("DATABASE_PATH").filter(|v| !v.trim().is_empty()) {
            config.database_path = PathBuf::from(v.trim());
        }
        if let Some(v) = env_value("ARCHIVE_INPUT_DIR").filter(|v| !v.trim().is_empty()) {
            config.input_dir = PathBuf::from(v.trim());
        }

        let per_page = env_usize("DEFAULT_PER_PAGE", config.default_per_page);
        if ALLOWED_PAGE_SIZES.contains(&per_page) {
            config.default_per_page = per_page;
        } else {
            tracing::warn!(
                per_page,
                fallback = config.default_per_page,
                "DEFAULT_PER_PAGE is not an allowed page size"
            );
        }

        config.vacuum_after_migrate = env_bool("VACUUM_AFTER_MIGRATE", config.vacuum_after_migrate);

        if let Some(v) = env_value("SIGNATURE_AGENT_NAMES") {
            config.signature_agent_names = parse_csv(&v);
        }

        config
    }

    /// Resolve a requested page size against the allowed set.
    #[must_use]
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|n| ALLOWED_PAGE_SIZES.contains(n))
            .unwrap_or(self.default_per_page)
    }
}

// Helper functions for environment variable parsing

static DOTENV_VALUES: OnceLock<HashMap<String, String>> = OnceLock::new();

#[cfg(test)]
thread_local! {
    static TEST_ENV_OVERRIDES: std::cell::RefCell<HashMap<String, String>> =
        std::cell::RefCell::new(HashMap::new());
}

#[cfg(test)]
fn test_env_override_value(key: &str) -> Option<String> {
    TEST_ENV_OVERRIDES.with(|cell| cell.borrow().get(key).cloned())
}

fn dotenv_values() -> &'static HashMap<String, String> {
    DOTENV_VALUES.get_or_init(|| load_dotenv_file(Path::new(".env")))
}

/// Read a value from the .env file (if present).
#[must_use]
pub fn dotenv_value(key: &str) -> Option<String> {
    dotenv_values().get(key).cloned()
}

/// Read a value from the real environment first, falling back to .env.
#[must_use]
pub fn env_value(key: &str) -> Option<String> {
    #[cfg(test)]
    if let Some(v) = test_env_override_value(key) {
        return Some(v);
    }
    env::var(key).ok().or_else(|| dotenv_value(key))
}

fn load_dotenv_file(path: &Path) -> HashMap<String, String> {
    let Ok(contents) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    parse_dotenv_contents(&contents)
}

/// Parse `KEY=value` lines. Blank lines, `#` comments and an `export ` prefix
/// are tolerated; matching single or double quotes around a value are removed.
#[must_use]
pub fn parse_dotenv_contents(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        map.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    map
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    // Unquoted values may carry a trailing ` # comment`.
    value
        .split_once(" #")
        .map_or(value, |(head, _)| head.trim_end())
}

/// Lenient boolean parsing shared by config keys and the visibility column.
#[must_use]
pub fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => true,
        "0" | "false" | "f" | "no" | "n" => false,
        _ => default,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env_value(key).map_or(default, |v| parse_bool(&v, default))
}

fn env_usize(key: &str, default: usize) -> usize {
    env_value(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestEnvOverrideGuard {
        previous: Vec<(String, Option<String>)>,
    }

    impl TestEnvOverrideGuard {
        fn set(vars: &[(&str, &str)]) -> Self {
            let mut previous = Vec::new();
            TEST_ENV_OVERRIDES.with(|cell| {
                let mut map = cell.borrow_mut();
                for (key, value) in vars {
                    let old = map.get(*key).cloned();
                    previous.push(((*key).to_string(), old));
                    map.insert((*key).to_string(), (*value).to_string());
                }
            });
            Self { previous }
        }
    }

    impl Drop for TestEnvOverrideGuard {
        fn drop(&mut self) {
            TEST_ENV_OVERRIDES.with(|cell| {
                let mut map = cell.borrow_mut();
                for (key, value) in self.previous.drain(..) {
                    match value {
                        Some(v) => {
                            map.insert(key, v);
                        }
                        None => {
                            map.remove(&key);
                        }
                    }
                }
            });
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("data/tickets.db"));
        assert_eq!(config.input_dir, PathBuf::from("data"));
        assert_eq!(config.default_per_page, 20);
        assert!(!config.vacuum_after_migrate);
        assert!(config.signature_agent_names.is_empty());
    }

    #[test]
    fn test_config_from_env_overrides() {
        let _env = TestEnvOverrideGuard::set(&[
            ("DATABASE_PATH", "/tmp/archive.db"),
            ("ARCHIVE_INPUT_DIR", "/tmp/exports"),
            ("DEFAULT_PER_PAGE", "50"),
            ("VACUUM_AFTER_MIGRATE", "yes"),
            ("SIGNATURE_AGENT_NAMES", "Dana Scully, Fox Mulder ,,"),
        ]);
        let config = Config::from_env();
        assert_eq!(config.database_path, PathBuf::from("/tmp/archive.db"));
        assert_eq!(config.input_dir, PathBuf::from("/tmp/exports"));
        assert_eq!(config.default_per_page, 50);
        assert!(config.vacuum_after_migrate);
        assert_eq!(
            config.signature_agent_names,
            vec!["Dana Scully".to_string(), "Fox Mulder".to_string()]
        );
    }

    #[test]
    fn test_disallowed_per_page_keeps_default() {
        let _env = TestEnvOverrideGuard::set(&[("DEFAULT_PER_PAGE", "37")]);
        assert_eq!(Config::from_env().default_per_page, 20);
    }

    #[test]
    fn test_page_size_resolution() {
        let config = Config::default();
        assert_eq!(config.page_size(Some(100)), 100);
        assert_eq!(config.page_size(Some(7)), 20);
        assert_eq!(config.page_size(None), 20);
    }

    #[test]
    fn test_parse_bool_variants() {
        for v in ["1", "true", "True", "T", "yes", "Y", " y "] {
            assert!(parse_bool(v, false), "{v}");
        }
        for v in ["0", "false", "F", "no", "N"] {
            assert!(!parse_bool(v, true), "{v}");
        }
        assert!(!parse_bool("", false));
        assert!(parse_bool("maybe", true));
    }

    #[test]
    fn test_parse_dotenv_contents() {
        let parsed = parse_dotenv_contents(
            "# comment\n\
             DATABASE_PATH=\"/srv/tickets.db\"\n\
             export VACUUM_AFTER_MIGRATE=1\n\
             SIGNATURE_AGENT_NAMES='A, B'\n\
             DEFAULT_PER_PAGE=25 # page size\n\
             not a pair\n",
        );
        assert_eq!(parsed["DATABASE_PATH"], "/srv/tickets.db");
        assert_eq!(parsed["VACUUM_AFTER_MIGRATE"], "1");
        assert_eq!(parsed["SIGNATURE_AGENT_NAMES"], "A, B");
        assert_eq!(parsed["DEFAULT_PER_PAGE"], "25");
        assert_eq!(parsed.len(), 4);
    }
}
