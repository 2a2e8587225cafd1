use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Configuration for logging.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
    pub include_file: bool,
    pub include_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
            include_file: false,
            include_line: false,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>, format: LogFormat) -> Self {
        Self {
            level: level.into(),
            format,
            ..Self::default()
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initializes the global subscriber. Returns false if one was already installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let layer = fmt::layer()
        .with_target(config.include_target)
        .with_file(config.include_file)
        .with_line_number(config.include_line);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => layer.json().with_span_events(FmtSpan::CLOSE).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Logging initialized with level: {}", config.level);
    }
    installed
}

/// Renders a storage key for log output.
///
/// Printable ASCII keys are shown as-is; anything else is hex encoded with a
/// `0x` marker. Long keys are abbreviated.
pub fn display_key(key: &[u8]) -> String {
    let printable = key.iter().all(|b| b.is_ascii_graphic() || *b == b' ');
    let rendered = match std::str::from_utf8(key) {
        Ok(s) if printable => s.to_string(),
        _ => format!("0x{}", hex::encode(key)),
    };
    abbreviate(&rendered, DISPLAY_KEY_VISIBLE)
}

const DISPLAY_KEY_VISIBLE: usize = 48;

/// Truncates long keys for logging, keeping the start and the end.
pub fn abbreviate(value: &str, visible_chars: usize) -> String {
    if value.len() <= visible_chars * 2 || !value.is_ascii() {
        return value.to_string();
    }

    let prefix = &value[..visible_chars];
    let suffix = &value[value.len() - visible_chars..];
    format!("{}...{}", prefix, suffix)
}
