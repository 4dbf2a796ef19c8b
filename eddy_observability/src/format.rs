//! Compact single-line log format used when stdout is a terminal.
//!
//! Lines look like `[INFO] [10-16|07:38:12.042] Batch flushed  records=100 version=7`.

use std::fmt::{self, Write as _};
use std::io;

use nu_ansi_term::Color;
use time::format_description::OwnedFormatItem;
use tracing::{Event, Level, Subscriber, field};
use tracing_subscriber::field::{RecordFields, VisitFmt, VisitOutput};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

/// Width the message column is padded to so that fields line up.
const MESSAGE_WIDTH: usize = 40;

pub(crate) struct EddyFormat {
    time_format: OwnedFormatItem,
}

impl Default for EddyFormat {
    fn default() -> Self {
        let time_format = time::format_description::parse_owned::<2>(
            r#"\[[month]-[day]|[hour]:[minute]:[second].[subsecond digits:3]\]"#,
        )
        .expect("log time format is a valid format description");

        Self { time_format }
    }
}

impl EddyFormat {
    fn write_time(&self, writer: &mut Writer<'_>) -> fmt::Result {
        let now = time::OffsetDateTime::from(std::time::SystemTime::now());
        let mut adaptor = FmtWriteAdaptor { inner: writer };
        now.format_into(&mut adaptor, &self.time_format)
            .map(|_| ())
            .map_err(|_| fmt::Error)
    }
}

impl<S, N> FormatEvent<S, N> for EddyFormat
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
        let ansi = writer.has_ansi_escapes();
        write_level(&mut writer, event.metadata().level(), ansi)?;
        writer.write_char(' ')?;

        if self.write_time(&mut writer).is_err() {
            writer.write_str("[<unknown-timestamp>]")?;
        }
        writer.write_char(' ')?;

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

impl<'w> FormatFields<'w> for EddyFormat {
    fn format_fields<R: RecordFields>(&self, writer: Writer<'w>, fields: R) -> fmt::Result {
        let mut visitor = FieldVisitor::new(writer, true);
        fields.record(&mut visitor);
        visitor.finish()
    }

    fn add_fields(
        &self,
        current: &'w mut FormattedFields<Self>,
        fields: &tracing::span::Record<'_>,
    ) -> fmt::Result {
        let is_empty = current.is_empty();
        let mut visitor = FieldVisitor::new(current.as_writer(), is_empty);
        fields.record(&mut visitor);
        visitor.finish()
    }
}

fn write_level(writer: &mut Writer<'_>, level: &Level, ansi: bool) -> fmt::Result {
    let (label, color) = match *level {
        Level::TRACE => ("TRACE", Color::Purple),
        Level::DEBUG => ("DEBUG", Color::Blue),
        Level::INFO => ("INFO", Color::Green),
        Level::WARN => ("WARN", Color::Yellow),
        Level::ERROR => ("ERROR", Color::Red),
    };

    if ansi {
        write!(writer, "[{}]", color.paint(label))
    } else {
        write!(writer, "[{}]", label)
    }
}

struct FieldVisitor<'a> {
    writer: Writer<'a>,
    is_empty: bool,
    result: fmt::Result,
}

impl<'a> FieldVisitor<'a> {
    fn new(writer: Writer<'a>, is_empty: bool) -> Self {
        Self {
            writer,
            is_empty,
            result: Ok(()),
        }
    }

    fn separator(&mut self) -> &'static str {
        if self.is_empty {
            self.is_empty = false;
            ""
        } else {
            " "
        }
    }
}

impl field::Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &field::Field, value: &str) {
        if field.name() == "message" {
            self.record_debug(field, &format_args!("{}", value));
        } else {
            self.record_debug(field, &value);
        }
    }

    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        if self.result.is_err() {
            return;
        }

        let separator = self.separator();
        let ansi = self.writer.has_ansi_escapes();

        self.result = match field.name() {
            "message" => {
                let message = format!("{:?}", value);
                write!(self.writer, "{}{:<width$}", separator, message, width = MESSAGE_WIDTH)
            }
            name if ansi => {
                let color = if name == "error" { Color::Red } else { Color::Blue };
                let value = format!("{:?}", value);
                write!(self.writer, "{}{}={}", separator, name, color.paint(value))
            }
            name => write!(self.writer, "{}{}={:?}", separator, name, value),
        };
    }
}

impl VisitOutput<fmt::Result> for FieldVisitor<'_> {
    fn finish(self) -> fmt::Result {
        self.result
    }
}

impl VisitFmt for FieldVisitor<'_> {
    fn writer(&mut self) -> &mut dyn fmt::Write {
        &mut self.writer
    }
}

/// Bridges `time`'s `io::Write` based formatting onto a `fmt::Write`.
struct FmtWriteAdaptor<'a, 'w> {
    inner: &'a mut Writer<'w>,
}

impl io::Write for FmtWriteAdaptor<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = std::str::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.inner.write_str(s).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
