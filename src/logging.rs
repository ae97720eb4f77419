//! JSON line logging.
//!
//! Log format:
//! ```json
//! {"ts":"2026-01-05T15:04:05.123Z","level":"info","type":"app","msg":"listening","ctx":{"service":"pivot"},"data":{}}
//! ```
//!
//! Events with target `access` get type `access` and a `METHOD /path STATUS`
//! message; `ERROR` events get type `error`; everything else is `app`.

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogTarget, LoggingConfig};

/// Install the global subscriber described by `config`.
///
/// A second call is a no-op.
pub fn init(config: &LoggingConfig) {
    let subscriber = match config.target {
        LogTarget::Stdout => build_subscriber(config, std::io::stdout),
        LogTarget::Stderr => build_subscriber(config, std::io::stderr),
    };

    if subscriber.try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Subscriber for `config` writing through `make_writer`.
pub fn build_subscriber<W>(config: &LoggingConfig, make_writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        Box::new(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .with_writer(make_writer)
                    .event_format(JsonFormatter::new(config.service_name.clone())),
            ),
        )
    } else {
        Box::new(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(make_writer),
            ),
        )
    }
}

/// Formats each event as one JSON object per line.
pub struct JsonFormatter {
    service_name: String,
}

impl JsonFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let level = match *meta.level() {
            Level::TRACE | Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };

        let log_type = if meta.target() == "access" {
            "access"
        } else if *meta.level() == Level::ERROR {
            "error"
        } else {
            "app"
        };

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let msg = if log_type == "access" {
            let field = |name: &str| {
                visitor
                    .fields
                    .get(name)
                    .and_then(Value::as_str)
                    .unwrap_or("?")
                    .to_string()
            };
            let status = visitor
                .fields
                .get("status")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            format!("{} {} {}", field("method"), field("path"), status)
        } else {
            visitor.message.clone().unwrap_or_default()
        };

        let entry = json!({
            "ts": crate::time::iso8601_now(),
            "level": level,
            "type": log_type,
            "msg": msg,
            "ctx": { "service": &self.service_name },
            "data": visitor.fields,
        });

        writeln!(writer, "{}", entry)
    }
}

/// Collects event fields, keeping `message` apart.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: HashMap<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &tracing::field::Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value).trim_matches('"').to_string());
        } else {
            self.insert(field, Value::String(format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.insert(field, json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.insert(field, json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.insert(field, json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.insert(field, json!(value));
    }
}
