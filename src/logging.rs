use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// `<emoji> LEVEL [HH:MM:SS] (module): message`; the module only appears in verbose mode
pub struct CustomFormatter {
    show_module: bool,
}

impl CustomFormatter {
    pub fn new(show_module: bool) -> Self {
        Self { show_module }
    }
}

fn short_module(target: &str) -> &str {
    target
        .strip_prefix("hosttestify::")
        .and_then(|rest| rest.rsplit("::").next())
        .unwrap_or(target)
}

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let timestamp = Local::now().format("%H:%M:%S");

        let (emoji, level_str) = match *metadata.level() {
            tracing::Level::TRACE => ("🔬", "TRACE"),
            tracing::Level::DEBUG => ("🐛", "DEBUG"),
            tracing::Level::INFO => ("ℹ️ ", "INFO"),
            tracing::Level::WARN => ("⚠️ ", "WARN"),
            tracing::Level::ERROR => ("❌", "ERROR"),
        };

        write!(writer, "{} {} [{}]", emoji, level_str, timestamp)?;
        if self.show_module {
            write!(writer, " ({})", short_module(metadata.target()))?;
        }
        write!(writer, ": ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber; logs go to stderr so stdout stays free for event streams
pub fn init(verbose: bool) {
    let filter = if verbose {
        "hosttestify=debug,warn"
    } else {
        "hosttestify=warn,error"
    };

    tracing_subscriber::fmt()
        .event_format(CustomFormatter::new(verbose))
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_module() {
        assert_eq!(short_module("hosttestify::execution::reconciler"), "reconciler");
        assert_eq!(short_module("hosttestify::config"), "config");
        assert_eq!(short_module("tokio::runtime"), "tokio::runtime");
    }
}
