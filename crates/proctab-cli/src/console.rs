//! Output sink that writes to the terminal.

use std::io::{self, Write};

use proctab_core::PreviewDescription;
use proctab_supervisor::OutputSink;
use proctab_supervisor::sink::SinkUnavailable;

/// Writes sink output to stdout, one line per message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn stdout(&self, line: &str) -> Result<(), SinkUnavailable> {
        writeln!(io::stdout(), "{line}").map_err(|_| SinkUnavailable)
    }

    fn preview(&self, preview: &PreviewDescription) -> Result<(), SinkUnavailable> {
        writeln!(io::stdout(), "[{}] {}", preview.host, preview.command).map_err(|_| SinkUnavailable)
    }
}
