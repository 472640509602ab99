use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use facegate_core::{EnrollmentPolicy, MatchPolicy, PolicyError};
use serde::Deserialize;
use thiserror::Error;

use crate::cli::Cli;

pub const CONFIG_PATH_ENV: &str = "FACEGATE_CONFIG";
pub const DB_PATH_ENV: &str = "FACEGATE_DB_PATH";
pub const THRESHOLD_ENV: &str = "FACEGATE_MATCH_THRESHOLD";
pub const EARLY_EXIT_ENV: &str = "FACEGATE_EARLY_EXIT_THRESHOLD";
pub const STORE_KEY_ENV: &str = "FACEGATE_STORE_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid match policy: {0}")]
    Policy(#[from] PolicyError),
}

/// On-disk TOML configuration. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub db_path: Option<PathBuf>,
    pub match_threshold: Option<f64>,
    pub early_exit_threshold: Option<f64>,
    pub exhaustive_scan: Option<bool>,
    pub enrollment_policy: Option<EnrollmentPolicy>,
    pub store_key: Option<String>,
}

impl ConfigFile {
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub policy: MatchPolicy,
    pub enrollment_policy: EnrollmentPolicy,
    pub store_key: Option<String>,
    /// Config file that contributed, if any.
    pub source: Option<PathBuf>,
}

impl Config {
    /// Resolve from the process environment and CLI flags.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Resolve with precedence: flags > environment > config file > defaults.
    pub fn resolve<F>(cli: &Cli, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = cli
            .config
            .clone()
            .or_else(|| env(CONFIG_PATH_ENV).map(PathBuf::from));
        let file = match &source {
            Some(path) => ConfigFile::read(path)?,
            None => ConfigFile::default(),
        };

        let defaults = MatchPolicy::default();

        let db_path = cli
            .db
            .clone()
            .or_else(|| env(DB_PATH_ENV).map(PathBuf::from))
            .or(file.db_path)
            .unwrap_or_else(|| default_db_path(&env));

        let threshold = match cli.threshold {
            Some(value) => value,
            None => env_f64(&env, THRESHOLD_ENV)?
                .or(file.match_threshold)
                .unwrap_or(defaults.threshold),
        };

        // Scan mode is decided by the highest layer that says anything about
        // it. Within a layer, exhaustive wins over an early-exit value.
        let early_exit_threshold = if cli.exhaustive {
            None
        } else if let Some(value) = cli.early_exit {
            Some(value)
        } else if let Some(value) = env_f64(&env, EARLY_EXIT_ENV)? {
            Some(value)
        } else if file.exhaustive_scan == Some(true) {
            None
        } else {
            file.early_exit_threshold.or(defaults.early_exit_threshold)
        };

        let policy = MatchPolicy::new(threshold, early_exit_threshold)?;

        let store_key = env(STORE_KEY_ENV)
            .or(file.store_key)
            .filter(|key| !key.is_empty());

        Ok(Self {
            db_path,
            policy,
            enrollment_policy: file.enrollment_policy.unwrap_or_default(),
            store_key,
            source,
        })
    }
}

fn env_f64<F>(env: &F, key: &'static str) -> Result<Option<f64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}

fn default_db_path<F>(env: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    env("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
        .join("faces.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Commands;
    use std::collections::HashMap;

    fn cli() -> Cli {
        Cli {
            config: None,
            db: None,
            threshold: None,
            early_exit: None,
            exhaustive: false,
            json: false,
            verbose: false,
            command: Commands::Status {
                identity: "alice".into(),
            },
        }
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(&cli(), env_from(&[("HOME", "/home/u")])).unwrap();
        assert_eq!(config.policy, MatchPolicy::default());
        assert_eq!(
            config.db_path,
            PathBuf::from("/home/u/.local/share/facegate/faces.db")
        );
        assert_eq!(config.enrollment_policy, EnrollmentPolicy::AllSamples);
        assert!(config.store_key.is_none());
    }

    #[test]
    fn test_env_overrides_defaults() {
        let env = env_from(&[
            ("XDG_DATA_HOME", "/data"),
            (THRESHOLD_ENV, "0.5"),
            (EARLY_EXIT_ENV, "0.2"),
            (STORE_KEY_ENV, "s3cret"),
        ]);
        let config = Config::resolve(&cli(), env).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/data/facegate/faces.db"));
        assert_eq!(config.policy.threshold, 0.5);
        assert_eq!(config.policy.early_exit_threshold, Some(0.2));
        assert_eq!(config.store_key.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_flags_override_env() {
        let mut args = cli();
        args.threshold = Some(0.7);
        args.db = Some(PathBuf::from("/tmp/x.db"));
        let env = env_from(&[(THRESHOLD_ENV, "0.5"), (DB_PATH_ENV, "/var/y.db")]);
        let config = Config::resolve(&args, env).unwrap();
        assert_eq!(config.policy.threshold, 0.7);
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_exhaustive_disables_early_exit() {
        let mut args = cli();
        args.exhaustive = true;
        args.early_exit = Some(0.1);
        let config = Config::resolve(&args, env_from(&[])).unwrap();
        assert_eq!(config.policy.early_exit_threshold, None);
    }

    fn exhaustive_config_file(dir: &Path) -> PathBuf {
        let path = dir.join("facegate.toml");
        std::fs::write(&path, "exhaustive_scan = true\nearly_exit_threshold = 0.25\n").unwrap();
        path
    }

    #[test]
    fn test_flag_early_exit_beats_file_exhaustive() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut args = cli();
        args.config = Some(exhaustive_config_file(tmp.path()));
        args.early_exit = Some(0.1);
        let config = Config::resolve(&args, env_from(&[])).unwrap();
        assert_eq!(config.policy.early_exit_threshold, Some(0.1));
    }

    #[test]
    fn test_env_early_exit_beats_file_exhaustive() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut args = cli();
        args.config = Some(exhaustive_config_file(tmp.path()));
        let config = Config::resolve(&args, env_from(&[(EARLY_EXIT_ENV, "0.2")])).unwrap();
        assert_eq!(config.policy.early_exit_threshold, Some(0.2));
    }

    #[test]
    fn test_file_exhaustive_beats_file_early_exit() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut args = cli();
        args.config = Some(exhaustive_config_file(tmp.path()));
        let config = Config::resolve(&args, env_from(&[])).unwrap();
        assert_eq!(config.policy.early_exit_threshold, None);
    }

    #[test]
    fn test_rejects_unparseable_env_value() {
        let err = Config::resolve(&cli(), env_from(&[(THRESHOLD_ENV, "high")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: THRESHOLD_ENV,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_early_exit_above_threshold() {
        let mut args = cli();
        args.threshold = Some(0.2);
        let err = Config::resolve(&args, env_from(&[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Policy(PolicyError::EarlyExitAboveThreshold { .. })
        ));
    }

    #[test]
    fn test_reads_config_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("facegate.toml");
        std::fs::write(
            &path,
            r#"
db_path = "/srv/facegate/faces.db"
match_threshold = 0.55
exhaustive_scan = true
enrollment_policy = "average"
"#,
        )
        .unwrap();

        let env = env_from(&[(CONFIG_PATH_ENV, path.to_str().unwrap())]);
        let config = Config::resolve(&cli(), env).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/srv/facegate/faces.db"));
        assert_eq!(config.policy.threshold, 0.55);
        assert_eq!(config.policy.early_exit_threshold, None);
        assert_eq!(config.enrollment_policy, EnrollmentPolicy::Average);
        assert_eq!(config.source, Some(path));
    }

    #[test]
    fn test_rejects_unknown_config_keys() {
        let err = ConfigFile::parse("similarity = 0.4", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_config_file() {
        let mut args = cli();
        args.config = Some(PathBuf::from("/nonexistent/facegate.toml"));
        let err = Config::resolve(&args, env_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
