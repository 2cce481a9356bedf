//! Structured logging setup shared by the download controller binary.

use std::str::FromStr;

use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("unrecognized log format '{s}', expected 'plain' or 'json'"),
        }
    }
}

/// Installs a global `tracing` subscriber reading its filter from
/// `RUST_LOG`, falling back to `info` when unset.
pub fn init(log_format: LogFormat) -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Plain => {
            let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
            registry.with(fmt_layer).try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(false);
            registry.with(fmt_layer).try_init()?;
        }
    }

    Ok(())
}

/// Replaces the default panic hook with one that emits the panic through
/// `tracing` so it lands in the same log stream (and, in JSON mode, the
/// same structured format) as everything else.
pub fn replace_panic_hook_with_tracing_panic_hook() -> scopeguard::ScopeGuard<(), impl FnOnce(())>
{
    std::panic::set_hook(Box::new(tracing_panic::panic_hook));
    scopeguard::guard((), |()| {
        let _ = std::panic::take_hook();
    })
}

mod tracing_panic {
    pub fn panic_hook(info: &std::panic::PanicInfo) {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "Box<dyn Any>".to_string());

        match info.location() {
            Some(location) => {
                tracing::error!(%payload, %location, "a thread panicked");
            }
            None => {
                tracing::error!(%payload, "a thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats() {
        assert_eq!(LogFormat::from_str("plain").unwrap(), LogFormat::Plain);
        assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
        assert!(LogFormat::from_str("xml").is_err());
    }
}
