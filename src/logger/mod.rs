//! Leveled text logging over any `ufmt::uWrite` sink.
//!
//! The macros format straight into the sink, so nothing is buffered and no
//! `core::fmt` machinery ends up in the image.
//!
//! ```ignore
//! info!(log, "state {} -> {}", from, to);
//! ```

use core::convert::Infallible;

use ufmt::uWrite;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    pub const fn tag(self) -> &'static str {
        match self {
            Level::Error => "[ERR] ",
            Level::Warn => "[WRN] ",
            Level::Info => "[INF] ",
            Level::Debug => "[DBG] ",
        }
    }
}

/// Level the firmware logs at, raised by the `debug` feature.
pub const DEFAULT_LEVEL: Level = if cfg!(feature = "debug") {
    Level::Debug
} else {
    Level::Info
};

pub struct Logger<W> {
    sink: W,
    max_level: Level,
}

impl<W: uWrite> Logger<W> {
    pub const fn new(sink: W, max_level: Level) -> Self {
        Self { sink, max_level }
    }

    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    pub fn set_level(&mut self, level: Level) {
        self.max_level = level;
    }

    pub fn sink(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl uWrite for NullSink {
    type Error = Infallible;

    fn write_str(&mut self, _: &str) -> Result<(), Infallible> {
        Ok(())
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($logger:expr, $level:expr, $($arg:tt)*) => {{
        let logger = &mut $logger;
        let level = $level;
        if logger.enabled(level) {
            let sink = logger.sink();
            let _ = ufmt::uwrite!(sink, "{}", level.tag());
            let _ = ufmt::uwriteln!(sink, $($arg)*);
        }
    }};
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log!($logger, $crate::logger::Level::Error, $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log!($logger, $crate::logger::Level::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log!($logger, $crate::logger::Level::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log!($logger, $crate::logger::Level::Debug, $($arg)*)
    };
}
