//! Lambda-aware logging for the `log` facade.
//!
//! Records are written to stdout in the format selected by
//! `AWS_LAMBDA_LOG_FORMAT` (`TEXT` or `JSON`) and filtered at the level named
//! by `AWS_LAMBDA_LOG_LEVEL`. Both are read once, when the logger is built.
//! Inside a wrapped handler every record also carries the invocation's
//! `requestId`.
//!
//! ```no_run
//! use cfn_lambda::logger::{self, LogOptions};
//!
//! logger::init(LogOptions::new().with_function_arn()).ok();
//! log::info!("ready");
//! ```

use std::borrow::Cow;
use std::env;
use std::fmt;
use std::io::{self, Write};

use env_logger::{Builder, Target};
use log::{LevelFilter, Record, SetLoggerError};
use serde_json::Value;

use crate::context;
use crate::Context;

const LOG_FORMAT_VAR: &str = "AWS_LAMBDA_LOG_FORMAT";
const LOG_LEVEL_VAR: &str = "AWS_LAMBDA_LOG_LEVEL";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Anything but `JSON` means text.
    pub fn parse(s: &str) -> Self {
        match s {
            "JSON" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Maps Lambda's level names onto a filter; unknown names mean `INFO`.
pub fn parse_level(s: &str) -> LevelFilter {
    match s {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Text,
            level: LevelFilter::Info,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        let format = env::var(LOG_FORMAT_VAR).unwrap_or_default();
        let level = env::var(LOG_LEVEL_VAR).unwrap_or_default();
        LogConfig {
            format: LogFormat::parse(&format),
            level: parse_level(&level),
        }
    }
}

#[derive(Clone, Copy)]
struct Field {
    key: &'static str,
    value: fn(&Context) -> &str,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.key)
    }
}

/// Extra invocation fields to attach to each record.
///
/// `requestId` is always included.
#[derive(Clone, Debug, Default)]
pub struct LogOptions {
    fields: Vec<Field>,
}

impl LogOptions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds `functionArn`.
    pub fn with_function_arn(mut self) -> Self {
        self.fields.push(Field {
            key: "functionArn",
            value: |context| context.invoked_function_arn.as_str(),
        });
        self
    }
}

/// An `env_logger` builder configured from the environment.
pub fn builder(options: LogOptions) -> Builder {
    builder_with_config(LogConfig::from_env(), options)
}

pub fn builder_with_config(config: LogConfig, options: LogOptions) -> Builder {
    let mut builder = Builder::new();
    builder
        .filter_level(config.level)
        .target(Target::Stdout)
        .format(move |buf, record| {
            let timestamp = buf.timestamp_millis().to_string();
            write_record(buf, config.format, &options.fields, &timestamp, record)
        });
    builder
}

/// Installs the Lambda logger as the global `log` logger.
pub fn init(options: LogOptions) -> Result<(), SetLoggerError> {
    builder(options).try_init()
}

fn write_record<W: Write + ?Sized>(
    out: &mut W,
    format: LogFormat,
    fields: &[Field],
    timestamp: &str,
    record: &Record,
) -> io::Result<()> {
    let mut entries: Vec<(&str, String)> = vec![
        ("timestamp", timestamp.to_owned()),
        ("level", record.level().to_string()),
        ("message", record.args().to_string()),
        ("target", record.target().to_owned()),
    ];

    context::with_current(|context| {
        if let Some(context) = context {
            entries.push(("requestId", context.request_id.clone()));
            for field in fields {
                let value = (field.value)(context);
                if !value.is_empty() {
                    entries.push((field.key, value.to_owned()));
                }
            }
        }
    });

    match format {
        LogFormat::Json => {
            let object: serde_json::Map<String, Value> = entries
                .into_iter()
                .map(|(key, value)| (key.to_owned(), Value::String(value)))
                .collect();
            serde_json::to_writer(&mut *out, &object)?;
        }
        LogFormat::Text => {
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.write_all(b" ")?;
                }
                write!(out, "{}={}", key, text_value(value))?;
            }
        }
    }
    writeln!(out)
}

fn text_value(value: &str) -> Cow<str> {
    let plain = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '=' || c == '"');
    if plain {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(Value::String(value.to_owned()).to_string())
    }
}
