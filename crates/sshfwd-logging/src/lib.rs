use colored::*;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::{FmtContext, Layer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use sshfwd_traits::logging::{LoggingError, LoggingService};

/// `time LEVEL target: fields`, with the level tag colored when asked to.
struct ForwarderFormatter {
    use_color: bool,
}

impl ForwarderFormatter {
    fn level_tag(&self, level: Level) -> ColoredString {
        let tag = match level {
            Level::TRACE => "TRACE",
            Level::DEBUG => "DEBUG",
            Level::INFO => " INFO",
            Level::WARN => " WARN",
            Level::ERROR => "ERROR",
        };
        if !self.use_color {
            return tag.normal();
        }
        match level {
            Level::TRACE => tag.magenta().bold(),
            Level::DEBUG => tag.blue().bold(),
            Level::INFO => tag.green().bold(),
            Level::WARN => tag.yellow().bold(),
            Level::ERROR => tag.red().bold(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for ForwarderFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let target = if self.use_color {
            metadata.target().dimmed()
        } else {
            metadata.target().normal()
        };

        write!(writer, "{} {} {}: ", time, self.level_tag(*metadata.level()), target)?;

        ctx.format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

pub struct LoggingServiceImpl;

impl LoggingService for LoggingServiceImpl {
    fn init_logging(level_str: &str, use_color: bool) -> Result<(), LoggingError> {
        let level = Level::from_str(level_str).unwrap_or(Level::INFO);

        let env_filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();

        let layer = Layer::default().event_format(ForwarderFormatter { use_color });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
    }
}

/// Convenience wrapper around [`LoggingServiceImpl::init_logging`].
pub fn init_logging(level_str: &str, use_color: bool) -> Result<(), LoggingError> {
    LoggingServiceImpl::init_logging(level_str, use_color)
}
