//! Configuration module for zmsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! Command-line flags override whatever is loaded here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for zmsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Which archive backend compresses event directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiverKind {
    /// In-process zip writer.
    #[default]
    Native,
    /// External `zip` program.
    Command,
}

impl std::fmt::Display for ArchiverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiverKind::Native => write!(f, "native"),
            ArchiverKind::Command => write!(f, "command"),
        }
    }
}

impl std::str::FromStr for ArchiverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(ArchiverKind::Native),
            "command" => Ok(ArchiverKind::Command),
            other => Err(format!(
                "unknown archiver '{other}'; valid options: native, command"
            )),
        }
    }
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root of the event directory tree. `None` until set here or via `--root`.
    pub root: Option<PathBuf>,
    /// Name of the root-level remote directory archives are uploaded into.
    pub remote_dir: String,
    /// File extensions (case-insensitive, without dot) that count as images.
    pub image_extensions: Vec<String>,
    /// Maximum directories archived at once.
    pub archive_concurrency: usize,
    /// Maximum uploads in flight at once.
    pub upload_concurrency: usize,
    /// Retries for transient remote errors.
    pub max_retries: u32,
    /// Parent directory for the per-run scratch directory; system temp if `None`.
    pub scratch_dir: Option<PathBuf>,
    /// Archive backend.
    pub archiver: ArchiverKind,
    /// Program invoked by the `command` archiver.
    pub zip_program: String,
}

/// Authentication / OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth client-secret JSON downloaded from the Google Cloud console.
    pub client_secret: Option<PathBuf>,
    /// Directory holding the cached credential (`credentials.json`).
    pub token_dir: PathBuf,
    /// Whether authorization may prompt the user.
    pub interactive: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    ///
    /// Missing sections and fields take their default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/zmsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        default_config_dir().join("config.yaml")
    }
}

/// `<config_dir>/zmsync`, also the default token directory.
fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("zmsync")
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default remote directory name.
pub const DEFAULT_REMOTE_DIR: &str = "zm-events";

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: None,
            remote_dir: DEFAULT_REMOTE_DIR.to_string(),
            image_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            archive_concurrency: 4,
            upload_concurrency: 2,
            max_retries: 3,
            scratch_dir: None,
            archiver: ArchiverKind::Native,
            zip_program: "zip".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_secret: None,
            token_dir: default_config_dir(),
            interactive: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.upload_concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if let Some(root) = &self.sync.root {
            if !root.to_string_lossy().starts_with('~') && !root.is_dir() {
                errors.push(ValidationError {
                    field: "sync.root".into(),
                    message: format!("directory does not exist: {}", root.display()),
                });
            }
        }

        let remote_dir = self.sync.remote_dir.trim();
        if remote_dir.is_empty() {
            errors.push(ValidationError {
                field: "sync.remote_dir".into(),
                message: "must not be empty".into(),
            });
        } else if remote_dir.contains('/') {
            errors.push(ValidationError {
                field: "sync.remote_dir".into(),
                message: format!("must be a single directory name, got '{remote_dir}'"),
            });
        }

        if self.sync.image_extensions.is_empty() {
            errors.push(ValidationError {
                field: "sync.image_extensions".into(),
                message: "must list at least one extension".into(),
            });
        }
        if let Some(bad) = self
            .sync
            .image_extensions
            .iter()
            .find(|ext| ext.trim().is_empty() || ext.starts_with('.'))
        {
            errors.push(ValidationError {
                field: "sync.image_extensions".into(),
                message: format!("invalid extension '{bad}'; use e.g. 'jpg' without a dot"),
            });
        }

        if self.sync.archive_concurrency == 0 {
            errors.push(ValidationError {
                field: "sync.archive_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.sync.upload_concurrency == 0 {
            errors.push(ValidationError {
                field: "sync.upload_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.sync.archiver == ArchiverKind::Command && self.sync.zip_program.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.zip_program".into(),
                message: "must be set when archiver is 'command'".into(),
            });
        }

        // --- auth ---
        if let Some(secret) = &self.auth.client_secret {
            if !secret.to_string_lossy().starts_with('~') && !secret.is_file() {
                errors.push(ValidationError {
                    field: "auth.client_secret".into(),
                    message: format!("file does not exist: {}", secret.display()),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use zmsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/var/cache/zoneminder/events"))
///     .sync_remote_dir("camera-1")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration, e.g. one loaded from disk.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = Some(root);
        self
    }

    pub fn sync_remote_dir(mut self, name: impl Into<String>) -> Self {
        self.config.sync.remote_dir = name.into();
        self
    }

    pub fn sync_image_extensions(mut self, extensions: Vec<String>) -> Self {
        self.config.sync.image_extensions = extensions;
        self
    }

    pub fn sync_archive_concurrency(mut self, n: usize) -> Self {
        self.config.sync.archive_concurrency = n;
        self
    }

    pub fn sync_upload_concurrency(mut self, n: usize) -> Self {
        self.config.sync.upload_concurrency = n;
        self
    }

    pub fn sync_max_retries(mut self, n: u32) -> Self {
        self.config.sync.max_retries = n;
        self
    }

    pub fn sync_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.scratch_dir = Some(dir);
        self
    }

    pub fn sync_archiver(mut self, archiver: ArchiverKind) -> Self {
        self.config.sync.archiver = archiver;
        self
    }

    pub fn sync_zip_program(mut self, program: impl Into<String>) -> Self {
        self.config.sync.zip_program = program.into();
        self
    }

    // --- auth ---

    pub fn auth_client_secret(mut self, path: PathBuf) -> Self {
        self.config.auth.client_secret = Some(path);
        self
    }

    pub fn auth_token_dir(mut self, dir: PathBuf) -> Self {
        self.config.auth.token_dir = dir;
        self
    }

    pub fn auth_interactive(mut self, interactive: bool) -> Self {
        self.config.auth.interactive = interactive;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert!(cfg.sync.root.is_none());
        assert_eq!(cfg.sync.remote_dir, "zm-events");
        assert_eq!(cfg.sync.image_extensions, vec!["jpg", "jpeg", "png"]);
        assert_eq!(cfg.sync.archive_concurrency, 4);
        assert_eq!(cfg.sync.upload_concurrency, 2);
        assert_eq!(cfg.sync.max_retries, 3);
        assert!(cfg.sync.scratch_dir.is_none());
        assert_eq!(cfg.sync.archiver, ArchiverKind::Native);
        assert_eq!(cfg.sync.zip_program, "zip");
        assert!(cfg.auth.client_secret.is_none());
        assert!(cfg.auth.token_dir.ends_with("zmsync"));
        assert!(cfg.auth.interactive);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("zmsync/config.yaml"));
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
sync:
  root: /tmp/zm-events
  remote_dir: camera-1
  image_extensions: [jpg]
  archive_concurrency: 8
  upload_concurrency: 1
  max_retries: 5
  scratch_dir: /tmp/scratch
  archiver: command
  zip_program: /usr/bin/zip
auth:
  client_secret: /etc/zmsync/client_secret.json
  token_dir: /var/lib/zmsync
  interactive: false
logging:
  level: debug
"#;

        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");

        assert_eq!(cfg.sync.root, Some(PathBuf::from("/tmp/zm-events")));
        assert_eq!(cfg.sync.remote_dir, "camera-1");
        assert_eq!(cfg.sync.image_extensions, vec!["jpg"]);
        assert_eq!(cfg.sync.archive_concurrency, 8);
        assert_eq!(cfg.sync.upload_concurrency, 1);
        assert_eq!(cfg.sync.max_retries, 5);
        assert_eq!(cfg.sync.scratch_dir, Some(PathBuf::from("/tmp/scratch")));
        assert_eq!(cfg.sync.archiver, ArchiverKind::Command);
        assert_eq!(cfg.sync.zip_program, "/usr/bin/zip");
        assert_eq!(
            cfg.auth.client_secret,
            Some(PathBuf::from("/etc/zmsync/client_secret.json"))
        );
        assert_eq!(cfg.auth.token_dir, PathBuf::from("/var/lib/zmsync"));
        assert!(!cfg.auth.interactive);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"sync:\n  remote_dir: garage\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.remote_dir, "garage");
        assert_eq!(cfg.sync.upload_concurrency, 2);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.auth.interactive);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.remote_dir, "zm-events");
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn load_rejects_unknown_archiver() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"sync:\n  archiver: rar\n").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_concurrency() {
        let mut cfg = Config::default();
        cfg.sync.archive_concurrency = 0;
        cfg.sync.upload_concurrency = 0;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"sync.archive_concurrency".to_string()));
        assert!(fields.contains(&"sync.upload_concurrency".to_string()));
    }

    #[test]
    fn validate_catches_missing_root_directory() {
        let mut cfg = Config::default();
        cfg.sync.root = Some(PathBuf::from("/nonexistent/zm/events"));
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.root"));
    }

    #[test]
    fn validate_accepts_existing_root_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ConfigBuilder::new()
            .sync_root(dir.path().to_path_buf())
            .build();
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn validate_catches_bad_remote_dir() {
        let mut cfg = Config::default();
        cfg.sync.remote_dir = "  ".to_string();
        assert!(cfg.validate().iter().any(|e| e.field == "sync.remote_dir"));

        cfg.sync.remote_dir = "a/b".to_string();
        assert!(cfg.validate().iter().any(|e| e.field == "sync.remote_dir"));
    }

    #[test]
    fn validate_catches_bad_image_extensions() {
        let mut cfg = Config::default();
        cfg.sync.image_extensions.clear();
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "sync.image_extensions"));

        cfg.sync.image_extensions = vec![".jpg".to_string()];
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "sync.image_extensions" && e.message.contains(".jpg")));
    }

    #[test]
    fn validate_catches_empty_zip_program_for_command_archiver() {
        let mut cfg = Config::default();
        cfg.sync.archiver = ArchiverKind::Command;
        cfg.sync.zip_program = String::new();
        assert!(cfg.validate().iter().any(|e| e.field == "sync.zip_program"));
    }

    #[test]
    fn validate_catches_missing_client_secret() {
        let mut cfg = Config::default();
        cfg.auth.client_secret = Some(PathBuf::from("/nonexistent/secret.json"));
        assert!(cfg.validate().iter().any(|e| e.field == "auth.client_secret"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        assert!(cfg.validate().iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validate_accepts_all_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let mut cfg = Config::default();
            cfg.logging.level = level.to_string();
            assert!(
                !cfg.validate().iter().any(|e| e.field == "logging.level"),
                "level '{level}' should be valid"
            );
        }
    }

    // -- ArchiverKind --

    #[test]
    fn archiver_kind_parses_case_insensitively() {
        assert_eq!("native".parse::<ArchiverKind>(), Ok(ArchiverKind::Native));
        assert_eq!("COMMAND".parse::<ArchiverKind>(), Ok(ArchiverKind::Command));
        assert!("tar".parse::<ArchiverKind>().is_err());
        assert_eq!(ArchiverKind::Command.to_string(), "command");
    }

    // -- Builder --

    #[test]
    fn builder_starts_from_defaults() {
        let cfg = ConfigBuilder::new().build();
        assert_eq!(cfg.sync.remote_dir, "zm-events");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .sync_root(PathBuf::from("/custom/events"))
            .sync_remote_dir("porch")
            .sync_image_extensions(vec!["jpg".into()])
            .sync_archive_concurrency(2)
            .sync_upload_concurrency(6)
            .sync_max_retries(0)
            .sync_scratch_dir(PathBuf::from("/tmp/zm"))
            .sync_archiver(ArchiverKind::Command)
            .sync_zip_program("/opt/zip")
            .auth_client_secret(PathBuf::from("/secret.json"))
            .auth_token_dir(PathBuf::from("/tokens"))
            .auth_interactive(false)
            .logging_level("trace")
            .build();

        assert_eq!(cfg.sync.root, Some(PathBuf::from("/custom/events")));
        assert_eq!(cfg.sync.remote_dir, "porch");
        assert_eq!(cfg.sync.image_extensions, vec!["jpg"]);
        assert_eq!(cfg.sync.archive_concurrency, 2);
        assert_eq!(cfg.sync.upload_concurrency, 6);
        assert_eq!(cfg.sync.max_retries, 0);
        assert_eq!(cfg.sync.scratch_dir, Some(PathBuf::from("/tmp/zm")));
        assert_eq!(cfg.sync.archiver, ArchiverKind::Command);
        assert_eq!(cfg.sync.zip_program, "/opt/zip");
        assert_eq!(cfg.auth.client_secret, Some(PathBuf::from("/secret.json")));
        assert_eq!(cfg.auth.token_dir, PathBuf::from("/tokens"));
        assert!(!cfg.auth.interactive);
        assert_eq!(cfg.logging.level, "trace");
    }

    #[test]
    fn builder_from_config_keeps_loaded_values() {
        let mut loaded = Config::default();
        loaded.sync.remote_dir = "loaded".to_string();
        let cfg = ConfigBuilder::from_config(loaded)
            .sync_upload_concurrency(3)
            .build();
        assert_eq!(cfg.sync.remote_dir, "loaded");
        assert_eq!(cfg.sync.upload_concurrency, 3);
    }

    #[test]
    fn builder_build_validated_fails_for_invalid_config() {
        let result = ConfigBuilder::new()
            .sync_upload_concurrency(0)
            .logging_level("nope")
            .build_validated();
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn config_serializes_to_yaml_and_back() {
        let cfg = ConfigBuilder::new().sync_remote_dir("yard").build();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        assert!(yaml.contains("archiver: native"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.sync.remote_dir, "yard");
    }
}
