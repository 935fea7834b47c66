//! Diagnostic tracer for the memory-access layer.
//!
//! Tracing is off by default and gated on the `MEMACCESS_TRACE` environment
//! variable:
//!
//! - `"1"`, `"true"`, or `"stdout"`: write to stdout
//! - `"stderr"`: write to stderr
//! - `<path>`: write to the file at `<path>`
//!
//! All call sites go through [`access_msg!`] / [`access_warn!`], which
//! early-exit when tracing is disabled so the hot paths pay nothing for it.
//! The one exception is [`warn`]: degraded-mode warnings are emitted to
//! stderr even when tracing is off.

use std::{
    env,
    fmt::Arguments,
    fs::File,
    io::{stderr, stdout, BufWriter, Write},
    sync::{Mutex, OnceLock},
};

const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraceLevel {
    Debug,
    Warn,
}

impl TraceLevel {
    fn tag(self) -> &'static str {
        match self {
            TraceLevel::Debug => "debug",
            TraceLevel::Warn => "warn",
        }
    }
}

enum Sink {
    Stdout,
    Stderr,
    File(BufWriter<File>),
}

struct Tracer {
    sink: Mutex<Sink>,
}

static TRACER: OnceLock<Option<Tracer>> = OnceLock::new();

fn tracer() -> Option<&'static Tracer> {
    TRACER
        .get_or_init(|| {
            let target = env::var("MEMACCESS_TRACE").ok()?;
            let sink = match target.as_str() {
                "" | "0" | "false" => return None,
                "1" | "true" | "stdout" => Sink::Stdout,
                "stderr" => Sink::Stderr,
                path => Sink::File(BufWriter::with_capacity(BUFFER_SIZE, File::create(path).ok()?)),
            };
            Some(Tracer {
                sink: Mutex::new(sink),
            })
        })
        .as_ref()
}

pub fn enabled() -> bool {
    tracer().is_some()
}

pub fn msg(level: TraceLevel, args: Arguments) {
    let Some(t) = tracer() else { return };
    let Ok(mut sink) = t.sink.lock() else { return };
    let line = format!("[memaccess {}] {}", level.tag(), args);
    let _ = match &mut *sink {
        Sink::Stdout => writeln!(stdout(), "{line}"),
        Sink::Stderr => writeln!(stderr(), "{line}"),
        Sink::File(f) => writeln!(f, "{line}").and_then(|()| f.flush()),
    };
}

/// Warnings reach the user even with tracing disabled.
pub fn warn(args: Arguments) {
    if enabled() {
        msg(TraceLevel::Warn, args);
    } else {
        eprintln!("[memaccess warn] {args}");
    }
}

#[macro_export]
macro_rules! access_msg {
    ($($format:tt)*) => {
        if $crate::tracer::enabled() {
            $crate::tracer::msg($crate::tracer::TraceLevel::Debug, format_args!($($format)*));
        }
    };
}

#[macro_export]
macro_rules! access_warn {
    ($($format:tt)*) => {
        $crate::tracer::warn(format_args!($($format)*));
    };
}
