//! Settings from `ddlshift.toml` and the command line.
//!
//! Values are resolved in three layers: built-in defaults, then the config
//! file, then command-line flags.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use ddlshift_core::interim::Casing;
use ddlshift_core::DialectKind;

use crate::error::{CliError, Result};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "ddlshift.toml";

/// Contents of `ddlshift.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub dialect: Option<String>,
    /// Declared schema JSON, relative to the config file.
    pub schema: Option<PathBuf>,
    /// Migrations folder, relative to the config file.
    pub out: Option<PathBuf>,
    pub casing: Option<String>,
    pub strict: Option<bool>,
    pub breakpoints: Option<bool>,
}

impl FileConfig {
    /// Parses TOML text. Relative paths are kept as written.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] for invalid TOML or unknown keys.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads a config file, rebasing relative paths onto its directory.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(CliError::io(path))?;
        let mut config = Self::parse(&text, path)?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.schema = config.schema.map(|p| base.join(p));
            config.out = config.out.map(|p| base.join(p));
        }
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Loads `explicit` when given, otherwise [`DEFAULT_CONFIG_FILE`] if it
    /// exists, otherwise nothing.
    ///
    /// # Errors
    ///
    /// Fails when an explicit file is missing, or when a file is found but
    /// cannot be parsed.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Values given on the command line; `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dialect: Option<DialectKind>,
    pub schema: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub casing: Option<Casing>,
    pub strict: Option<bool>,
    pub breakpoints: Option<bool>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub dialect: DialectKind,
    pub schema: Option<PathBuf>,
    pub out: PathBuf,
    pub casing: Casing,
    /// Refuse destructive statements unless forced.
    pub strict: bool,
    /// Separate statements with breakpoint markers in SQL files.
    pub breakpoints: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: DialectKind::Postgresql,
            schema: None,
            out: PathBuf::from("migrations"),
            casing: Casing::Preserve,
            strict: false,
            breakpoints: true,
        }
    }
}

impl Config {
    /// Layers `file` and then `flags` over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::InvalidSetting`] for settings that are present but
    /// unusable.
    pub fn resolve(file: FileConfig, flags: Overrides) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dialect) = file.dialect {
            config.dialect = dialect.parse().map_err(|e: ddlshift_core::dialect::UnknownDialect| {
                CliError::InvalidSetting {
                    key: "dialect",
                    message: e.to_string(),
                }
            })?;
        }
        if let Some(casing) = file.casing {
            config.casing = casing
                .parse()
                .map_err(|message| CliError::InvalidSetting { key: "casing", message })?;
        }
        config.schema = file.schema.or(config.schema);
        config.out = file.out.unwrap_or(config.out);
        config.strict = file.strict.unwrap_or(config.strict);
        config.breakpoints = file.breakpoints.unwrap_or(config.breakpoints);

        config.dialect = flags.dialect.unwrap_or(config.dialect);
        config.schema = flags.schema.or(config.schema);
        config.out = flags.out.unwrap_or(config.out);
        config.casing = flags.casing.unwrap_or(config.casing);
        config.strict = flags.strict.unwrap_or(config.strict);
        config.breakpoints = flags.breakpoints.unwrap_or(config.breakpoints);

        Ok(config)
    }

    /// The schema path, or an error telling the user how to set one.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingSchema`] when no schema path is set.
    pub fn schema_path(&self) -> Result<&Path> {
        self.schema.as_deref().ok_or(CliError::MissingSchema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::resolve(FileConfig::default(), Overrides::default()).unwrap();
        assert_eq!(config, Config::default());
        assert!(matches!(config.schema_path(), Err(CliError::MissingSchema)));
    }

    #[test]
    fn test_flags_beat_file() {
        let file = FileConfig::parse(
            "dialect = \"sqlite\"\nout = \"db/migrations\"\ncasing = \"snake_case\"\nstrict = true\n",
            Path::new("ddlshift.toml"),
        )
        .unwrap();
        let flags = Overrides {
            dialect: Some(DialectKind::Mysql),
            strict: Some(false),
            ..Overrides::default()
        };
        let config = Config::resolve(file, flags).unwrap();
        assert_eq!(config.dialect, DialectKind::Mysql);
        assert_eq!(config.out, PathBuf::from("db/migrations"));
        assert_eq!(config.casing, Casing::SnakeCase);
        assert!(!config.strict);
        assert!(config.breakpoints);
    }

    #[test]
    fn test_bad_values_are_reported() {
        let file = FileConfig {
            dialect: Some("oracle".into()),
            ..FileConfig::default()
        };
        let err = Config::resolve(file, Overrides::default()).unwrap_err();
        assert!(matches!(err, CliError::InvalidSetting { key: "dialect", .. }));

        let err = FileConfig::parse("dialekt = \"pg\"", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_load_rebases_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ddlshift.toml");
        std::fs::write(&path, "schema = \"schema.json\"\n").unwrap();
        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.schema, Some(dir.path().join("schema.json")));
    }
}
