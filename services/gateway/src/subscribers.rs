//! Result sinks registered with the distributor at startup

use std::io::{self, Write};

use stream_engine::{Subscriber, SubscriberError};
use types::window::WindowResult;

/// Emits each result as a structured `tracing` event.
pub struct LogSubscriber;

impl Subscriber for LogSubscriber {
    fn name(&self) -> &str {
        "log"
    }

    fn on_result(&mut self, result: &WindowResult) -> Result<(), SubscriberError> {
        tracing::info!(
            window_id = result.window_id,
            symbol = %result.symbol,
            count = result.count,
            average = result.average,
            "Window result"
        );
        Ok(())
    }
}

/// Prints one human-readable line per result.
pub struct ConsoleSubscriber<W> {
    out: W,
}

impl ConsoleSubscriber<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSubscriber<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn format_result(result: &WindowResult) -> String {
    format!(
        "[window {}] {} count={} average={:.2}",
        result.window_id, result.symbol, result.count, result.average
    )
}

impl<W: Write + Send> Subscriber for ConsoleSubscriber<W> {
    fn name(&self) -> &str {
        "console"
    }

    fn on_result(&mut self, result: &WindowResult) -> Result<(), SubscriberError> {
        writeln!(self.out, "{}", format_result(result))
            .and_then(|_| self.out.flush())
            .map_err(|e| SubscriberError::failed(e.to_string()))
    }
}
