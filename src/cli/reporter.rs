//! Console reporting of outcomes as they arrive

use std::io::Write;

use crate::config::OutputFormat;
use crate::formatter::Formatter;
use crate::runner::{Outcome, Reporter};

/// Prints each outcome to stdout as soon as the runner produces it
pub struct ConsoleReporter {
    formatter: Formatter,
}

impl ConsoleReporter {
    pub fn new(formatter: Formatter) -> Self {
        Self { formatter }
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }
}

impl Reporter for ConsoleReporter {
    fn report(&mut self, index: usize, outcome: &Outcome) {
        let rendered = self.formatter.format_outcome(index, outcome);
        let mut stdout = std::io::stdout().lock();

        // Multi-line formats get a blank line between operations
        let separator = match self.formatter.format() {
            OutputFormat::Shell | OutputFormat::Table | OutputFormat::JsonPretty => "\n",
            OutputFormat::Json | OutputFormat::Compact => "",
        };
        let _ = writeln!(stdout, "{rendered}{separator}");
        let _ = stdout.flush();
    }
}
