// System
use std::{
    fs,
    path::{Path, PathBuf},
};

// Third Party
use anyhow::{ensure, Context};
use clap::{Parser, ValueEnum};
use serde::Deserialize;

// Local
use crate::error::Error;

pub const CONFIG_FILE_NAME: &str = "logbook.yaml";
pub const DEFAULT_LOG_FILENAME: &str = "k8s-events.log";
/// Watch requests are cut off by the API server after this many seconds unless configured.
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 290;
/// The cluster client refuses watch timeouts at or above its own read timeout of 295s.
pub const MAX_TIMEOUT_SECONDS: u32 = 294;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Authenticate with the pod's service account.
    InCluster,
    /// Authenticate with a kubeconfig file.
    OutOfCluster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogOut {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl LogLevel {
    /// The directive used to build the diagnostic log filter. `fatal` and `panic` are kept
    /// for compatibility with existing config files and only let errors through.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal | LogLevel::Panic => "error",
        }
    }
}

/// Logbook is a kubernetes event logger.
///
/// It can run in-cluster (authenticating with the pod's ServiceAccount) or out-of-cluster
/// (authenticating with a kubeconfig file). Every flag can also be set through the listed
/// environment variable or in `logbook.yaml`.
#[derive(Debug, Default, Parser)]
#[command(name = "logbook", version)]
pub struct Cli {
    /// Config file (default is the first logbook.yaml found in /etc/logbook/logbook, $HOME/.logbook, $PWD)
    #[arg(long, env = "LOGBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Running mode (default is in-cluster)
    #[arg(long, env = "LOGBOOK_MODE", value_enum)]
    pub mode: Option<AuthMode>,

    /// Path of the kubeconfig file, only used in out-of-cluster mode (default is $HOME/.kube/config)
    #[arg(long, env = "LOGBOOK_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Namespace to watch (default is all namespaces)
    #[arg(long, env = "LOGBOOK_NAMESPACE")]
    pub namespace: Option<String>,

    /// Seconds after which the API server ends the watch
    #[arg(long, env = "LOGBOOK_TIMEOUT_SECONDS")]
    pub timeout_seconds: Option<u32>,

    /// Only watch events matching this label selector
    #[arg(long, env = "LOGBOOK_LABEL_SELECTOR")]
    pub label_selector: Option<String>,

    /// Only watch events matching this field selector, e.g. `type=Warning`
    #[arg(long, env = "LOGBOOK_FIELD_SELECTOR")]
    pub field_selector: Option<String>,

    /// Log format (default is json)
    #[arg(long, env = "LOGBOOK_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log output (default is stdout)
    #[arg(long, env = "LOGBOOK_LOG_OUT", value_enum)]
    pub log_out: Option<LogOut>,

    /// Log level (default is info)
    #[arg(long, env = "LOGBOOK_LOG_LEVEL", value_enum)]
    pub log_level: Option<LogLevel>,

    /// Path of the log file, only used when log-out is file (default is ./k8s-events.log)
    #[arg(long, env = "LOGBOOK_LOG_FILENAME")]
    pub log_filename: Option<PathBuf>,
}

/// Layout of `logbook.yaml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    target: FileTarget,
    auth: FileAuth,
    log: FileLog,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FileTarget {
    namespace: Option<String>,
    #[serde(alias = "listoptions")]
    list_options: FileListOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FileListOptions {
    #[serde(alias = "timeoutseconds")]
    timeout_seconds: Option<u32>,
    #[serde(alias = "labelselector")]
    label_selector: Option<String>,
    #[serde(alias = "fieldselector")]
    field_selector: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileAuth {
    mode: Option<AuthMode>,
    #[serde(alias = "kubeConfig")]
    kubeconfig: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileLog {
    format: Option<LogFormat>,
    out: Option<LogOut>,
    level: Option<LogLevel>,
    filename: Option<PathBuf>,
}

impl FileConfig {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Options passed to the API server when opening the event watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    pub timeout_seconds: u32,
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            label_selector: None,
            field_selector: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSettings {
    /// Empty means all namespaces.
    pub namespace: String,
    pub watch: WatchOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub mode: AuthMode,
    pub kubeconfig: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogFormat,
    pub out: LogOut,
    pub level: LogLevel,
    pub filename: PathBuf,
}

/// Fully resolved configuration: defaults, then `logbook.yaml`, then environment, then flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub target: TargetSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
    /// The config file that was read, if any.
    pub config_file: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(cli: Cli) -> Result<Self, Error> {
        Self::resolve_with(cli, &default_search_paths()).map_err(Error::Config)
    }

    fn resolve_with(cli: Cli, search_paths: &[PathBuf]) -> anyhow::Result<Self> {
        let config_file = match &cli.config {
            Some(path) => Some(path.clone()),
            None => search_paths.iter().find(|path| path.is_file()).cloned(),
        };
        let file = match &config_file {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let list_options = file.target.list_options;

        let timeout_seconds = cli
            .timeout_seconds
            .or(list_options.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        ensure!(
            (1..=MAX_TIMEOUT_SECONDS).contains(&timeout_seconds),
            "timeoutSeconds must be between 1 and {}, got {}",
            MAX_TIMEOUT_SECONDS,
            timeout_seconds
        );

        Ok(Settings {
            target: TargetSettings {
                namespace: cli.namespace.or(file.target.namespace).unwrap_or_default(),
                watch: WatchOptions {
                    timeout_seconds,
                    label_selector: non_empty(cli.label_selector.or(list_options.label_selector)),
                    field_selector: non_empty(cli.field_selector.or(list_options.field_selector)),
                },
            },
            auth: AuthSettings {
                mode: cli.mode.or(file.auth.mode).unwrap_or(AuthMode::InCluster),
                kubeconfig: cli
                    .kubeconfig
                    .or(file.auth.kubeconfig)
                    .filter(|path| !path.as_os_str().is_empty()),
            },
            log: LogSettings {
                format: cli.log_format.or(file.log.format).unwrap_or(LogFormat::Json),
                out: cli.log_out.or(file.log.out).unwrap_or(LogOut::Stdout),
                level: cli.log_level.or(file.log.level).unwrap_or(LogLevel::Info),
                filename: cli
                    .log_filename
                    .or(file.log.filename)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILENAME)),
            },
            config_file,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Where `logbook.yaml` is looked up when no `--config` is given, in order.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![Path::new("/etc/logbook/logbook").join(CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".logbook").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}
