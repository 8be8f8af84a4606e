//! Tracing subscriber setup shared by the pydeps binaries.
//!
//! Behaviour is driven by environment variables:
//!
//! - `RUST_LOG` / `LOG_LEVEL`: filter directives (`RUST_LOG` wins when set)
//! - `LOG_OUTPUT`: `console`, `file`, `both` or `none`
//! - `LOG_FORMAT`: `human` or `json`
//! - `LOG_TAGS`: comma separated `key:value` span field filters (`*` matches any value)
//! - `LOG_FILE_PATH`: destination of the daily rolling log file

use std::{
    collections::HashMap,
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{field::Visit, span, subscriber::Interest, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Directive,
    fmt::MakeWriter,
    layer::{Context, Layer},
    prelude::*,
    registry, EnvFilter,
};

const DEFAULT_LOG_FILE: &str = "/tmp/pydeps.log";

/// Noisy dependency targets capped at `warn` when the filter comes from `LOG_LEVEL`.
const QUIET_TARGETS: &[&str] = &[
    "hyper=warn",
    "hyper_util=warn",
    "reqwest=warn",
    "rustls=warn",
    "tokio=warn",
];

/// Where formatted events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
    None,
}

impl LogOutput {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Self::File,
            "both" => Self::Both,
            "none" | "off" => Self::None,
            _ => Self::Console,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

/// A `key:value` requirement on the fields of the enclosing spans.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Logging settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
    pub tags: Vec<Tag>,
    pub file_path: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Console,
            format: LogFormat::Human,
            tags: Vec::new(),
            file_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            level: lookup("LOG_LEVEL").unwrap_or(defaults.level),
            output: lookup("LOG_OUTPUT")
                .map(|v| LogOutput::parse(&v))
                .unwrap_or(defaults.output),
            format: match lookup("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Human,
            },
            tags: lookup("LOG_TAGS")
                .map(|v| parse_tags(&v))
                .unwrap_or_default(),
            file_path: lookup("LOG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
        }
    }
}

/// Parse `key:value,key2:value2`. Entries without a colon are ignored.
pub fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(',')
        .filter_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some(Tag {
                key: key.to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}

// Writes every buffer to both sinks.
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a>,
    B: MakeWriter<'a>,
{
    type Writer = Tee<A::Writer, B::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

struct TagFilterLayer {
    filters: Vec<Tag>,
}

impl<S> Layer<S> for TagFilterLayer
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = HashMap::new();
        attrs.record(&mut FieldVisitor(&mut fields));
        span.extensions_mut().insert(fields);
    }

    fn register_callsite(&self, _meta: &'static Metadata<'static>) -> Interest {
        // The verdict depends on the current span, so it cannot be cached.
        if self.filters.is_empty() {
            Interest::always()
        } else {
            Interest::sometimes()
        }
    }

    fn enabled(&self, meta: &Metadata<'_>, ctx: Context<'_, S>) -> bool {
        // Spans must exist for their fields to be matched against.
        if self.filters.is_empty() || meta.is_span() {
            return true;
        }

        // With tags configured, events outside any span are dropped.
        let Some(scope) = ctx.current_span().id().and_then(|id| ctx.span_scope(id)) else {
            return false;
        };

        let mut all_fields: HashMap<String, String> = HashMap::new();
        for span_ref in scope {
            if let Some(fields) = span_ref.extensions().get::<HashMap<String, String>>() {
                for (k, v) in fields {
                    all_fields.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }

        self.filters.iter().all(|filter| {
            all_fields
                .get(&filter.key)
                .is_some_and(|value| filter.value == "*" || value.contains(&filter.value))
        })
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

fn build_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    QUIET_TARGETS
        .iter()
        .filter_map(|target| target.parse::<Directive>().ok())
        .fold(EnvFilter::new(level), |filter, directive| {
            filter.add_directive(directive)
        })
}

fn install<W>(filter: EnvFilter, tags: TagFilterLayer, format: LogFormat, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = registry().with(filter).with(tags);
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(writer);
    // A subscriber may already be installed (tests, embedding); keep the first one.
    let _ = match format {
        LogFormat::Json => subscriber.with(fmt_layer.json()).try_init(),
        LogFormat::Human => subscriber.with(fmt_layer.compact()).try_init(),
    };
}

/// Initializes the global tracing subscriber from environment variables.
///
/// The returned guard must be held for the life of the process when file
/// output is enabled, otherwise buffered lines are lost on exit.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(&LogSettings::from_env())
}

pub fn init_with(settings: &LogSettings) -> Option<WorkerGuard> {
    let filter = build_filter(&settings.level);
    let tags = TagFilterLayer {
        filters: settings.tags.clone(),
    };

    let log_dir = settings
        .file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("/tmp"));
    let log_filename = settings
        .file_path
        .file_name()
        .unwrap_or_else(|| "pydeps.log".as_ref());

    match settings.output {
        LogOutput::Console => {
            install(filter, tags, settings.format, io::stderr);
            None
        }
        LogOutput::File => {
            let appender = tracing_appender::rolling::daily(log_dir, log_filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            install(filter, tags, settings.format, non_blocking);
            Some(guard)
        }
        LogOutput::Both => {
            let appender = tracing_appender::rolling::daily(log_dir, log_filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let tee = MakeTee {
                make_a: io::stderr,
                make_b: non_blocking,
            };
            install(filter, tags, settings.format, tee);
            Some(guard)
        }
        LogOutput::None => {
            let _ = registry().with(filter).with(tags).try_init();
            None
        }
    }
}
