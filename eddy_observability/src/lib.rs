//! Logging, tracing and metrics setup shared by the eddy crates.
//!
//! Logs always go to stdout. `RUST_LOG` controls the filter (default `info`) and
//! `RUST_LOG_FORMAT=json` switches to JSON lines for log collectors.
//!
//! OpenTelemetry export over OTLP is off unless `OTEL_SDK_DISABLED=false`.
//! The otel sdk does not honour that variable on its own, and we diverge from the
//! otel convention by defaulting to disabled.

use std::borrow::Cow;
use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{InstrumentationScope, global};
use opentelemetry_otlp::{ExporterBuildError, MetricExporter, SpanExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;
use snafu::{ResultExt, Snafu};
use tracing::Subscriber;
use tracing_opentelemetry::MetricsLayer;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::{prelude::*, registry::LookupSpan};

pub use opentelemetry::{
    KeyValue,
    metrics::{Counter, Meter},
};

pub use crate::error_kind::ErrorKind;

use crate::format::EddyFormat;

mod error_kind;
mod format;

const OTEL_SDK_DISABLED: &str = "OTEL_SDK_DISABLED";
const DEFAULT_LOG_FILTER: &str = "info";
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(10);

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum ObservabilityError {
    #[snafu(display("Failed to build OTLP exporter"))]
    Exporter { source: ExporterBuildError },
    #[snafu(display("Failed to install the global tracing subscriber"))]
    Install {
        source: tracing_subscriber::util::TryInitError,
    },
}

/// Keeps the otel providers alive and flushes them on drop.
#[derive(Debug)]
pub struct ObservabilityGuard {
    meter_provider: SdkMeterProvider,
    trace_provider: SdkTracerProvider,
}

/// Returns a meter from the global meter provider.
///
/// Before [`init_observability`] runs this is a no-op meter, which keeps
/// instrumented code usable from tests.
pub fn meter(name: &'static str) -> Meter {
    global::meter(name)
}

pub fn init_observability(
    package_name: impl Into<Cow<'static, str>>,
    package_version: impl Into<Cow<'static, str>>,
) -> Result<ObservabilityGuard, ObservabilityError> {
    let sdk_enabled = std::env::var(OTEL_SDK_DISABLED)
        .map(|v| v == "false")
        .unwrap_or(false);

    let (otel_layer, guard) = otel(package_name, package_version, sdk_enabled)?;
    let layers = vec![stdout(), otel_layer];

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context(InstallSnafu {})?;

    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let json_fmt = std::env::var("RUST_LOG_FORMAT")
        .map(|val| val == "json")
        .unwrap_or(false);

    if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(env_filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .event_format(EddyFormat::default())
            .fmt_fields(EddyFormat::default())
            .with_filter(env_filter())
            .boxed()
    }
}

fn otel<S>(
    package_name: impl Into<Cow<'static, str>>,
    version: impl Into<Cow<'static, str>>,
    sdk_enabled: bool,
) -> Result<(BoxedLayer<S>, ObservabilityGuard), ObservabilityError>
where
    S: Subscriber + Send + Sync,
    for<'a> S: LookupSpan<'a>,
{
    let package_name = package_name.into();
    let resource = Resource::builder()
        .with_service_name(package_name.clone())
        .build();

    let scope = InstrumentationScope::builder(package_name)
        .with_version(version.into())
        .build();

    let mut trace_provider = SdkTracerProvider::builder().with_resource(resource.clone());
    let mut meter_provider = SdkMeterProvider::builder().with_resource(resource);

    if sdk_enabled {
        let span_exporter = SpanExporter::builder()
            .with_tonic()
            .build()
            .context(ExporterSnafu {})?;
        trace_provider = trace_provider.with_batch_exporter(span_exporter);

        let metric_exporter = MetricExporter::builder()
            .with_tonic()
            .build()
            .context(ExporterSnafu {})?;
        let reader = PeriodicReader::builder(metric_exporter)
            .with_interval(METRICS_EXPORT_INTERVAL)
            .build();
        meter_provider = meter_provider.with_reader(reader);
    }

    let trace_provider = trace_provider.build();
    let meter_provider = meter_provider.build();
    global::set_meter_provider(meter_provider.clone());

    let tracer = trace_provider.tracer_with_scope(scope);
    let layer = env_filter()
        .and_then(MetricsLayer::new(meter_provider.clone()))
        .and_then(tracing_opentelemetry::layer().with_tracer(tracer))
        .boxed();

    let guard = ObservabilityGuard {
        meter_provider,
        trace_provider,
    };

    Ok((layer, guard))
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        // Errors here only mean there was nothing left to export.
        let _ = self.meter_provider.shutdown();
        let _ = self.trace_provider.shutdown();
    }
}
