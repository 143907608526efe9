use std::fmt;

use jiff::Timestamp;
use owo_colors::OwoColorize;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// The style of a grove logging line.
#[derive(Debug, Clone, Copy)]
pub struct GroveFormat {
    pub display_timestamp: bool,
    pub display_level: bool,
    /// Prefix each line with the module that logged it, e.g. `grove_pubgrub::solver`.
    pub display_target: bool,
    pub show_spans: bool,
}

impl Default for GroveFormat {
    /// Show the level and the message, nothing else.
    fn default() -> Self {
        Self {
            display_timestamp: false,
            display_level: true,
            display_target: false,
            show_spans: false,
        }
    }
}

impl GroveFormat {
    /// The format for `-v` style output, where the origin of each line matters.
    pub fn verbose() -> Self {
        Self {
            display_timestamp: true,
            display_level: true,
            display_target: true,
            show_spans: true,
        }
    }
}

/// See <https://docs.rs/tracing-subscriber/0.3.18/src/tracing_subscriber/fmt/format/mod.rs.html#1026-1156>
impl<S, N> FormatEvent<S, N> for GroveFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let ansi = writer.has_ansi_escapes();

        if self.display_timestamp {
            if ansi {
                write!(writer, "{} ", Timestamp::now().dimmed())?;
            } else {
                write!(writer, "{} ", Timestamp::now())?;
            }
        }

        if self.display_level {
            let level = meta.level();
            // Same colors as tracing
            if ansi {
                match *level {
                    Level::TRACE => write!(writer, "{} ", level.purple())?,
                    Level::DEBUG => write!(writer, "{} ", level.blue())?,
                    Level::INFO => write!(writer, "{} ", level.green())?,
                    Level::WARN => write!(writer, "{} ", level.yellow())?,
                    Level::ERROR => write!(writer, "{} ", level.red())?,
                }
            } else {
                write!(writer, "{level} ")?;
            }
        }

        if self.display_target {
            if ansi {
                write!(writer, "{} ", meta.target().dimmed())?;
            } else {
                write!(writer, "{} ", meta.target())?;
            }
        }

        if self.show_spans {
            let span = event.parent();
            let mut seen = false;

            let span = span
                .and_then(|id| ctx.span(id))
                .or_else(|| ctx.lookup_current());

            let scope = span.into_iter().flat_map(|span| span.scope().from_root());

            for span in scope {
                seen = true;
                if ansi {
                    write!(writer, "{}:", span.metadata().name().bold())?;
                } else {
                    write!(writer, "{}:", span.metadata().name())?;
                }
            }

            if seen {
                writer.write_char(' ')?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::{info, info_span, warn};
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    /// Collects everything written by the subscriber.
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(format: GroveFormat, log: impl FnOnce()) -> String {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(format)
            .with_writer(buffer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, log);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn default_format() {
        let output = capture(GroveFormat::default(), || {
            info!("Selecting foo 1.0.0");
            warn!(package = "bar", "No versions left");
        });
        insta::assert_snapshot!(output, @r#"
        INFO Selecting foo 1.0.0
        WARN No versions left package="bar"
        "#);
    }

    #[test]
    fn target_and_spans() {
        let format = GroveFormat {
            display_timestamp: false,
            ..GroveFormat::verbose()
        };
        let output = capture(format, || {
            let _guard = info_span!("resolve").entered();
            info!("Solved with 3 packages");
        });
        insta::assert_snapshot!(output, @"INFO grove_logging::tests resolve: Solved with 3 packages");
    }
}
