#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive for `EnvFilter` when `RUST_LOG` is unset.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "paksync=debug",
            LogLevel::Info => "paksync=info",
            LogLevel::Warn => "paksync=warn",
            LogLevel::Error => "paksync=error",
        }
    }
}
