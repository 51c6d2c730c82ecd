//! Line-prefixing writer for labelled process output

use chrono::Local;
use drover_api::Sink;
use std::io::{self, Write};

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Writer that prefixes every line with a label before forwarding it.
///
/// Partial lines are held back until their newline arrives or the writer is
/// flushed. Each line reaches the target in a single write, so several
/// loggers can share one target without interleaving inside a line.
pub struct LineLogger {
    label: String,
    timestamps: bool,
    target: Sink,
    pending: Vec<u8>,
}

impl LineLogger {
    pub fn new(label: impl Into<String>, target: Sink) -> Self {
        Self {
            label: label.into(),
            timestamps: false,
            target,
            pending: Vec::new(),
        }
    }

    /// Add a local timestamp after the label
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn into_sink(self) -> Sink {
        Sink::new(self)
    }

    fn emit(&mut self, line: &[u8]) -> io::Result<()> {
        let mut out = Vec::with_capacity(self.label.len() + line.len() + 24);
        out.extend_from_slice(self.label.as_bytes());
        out.extend_from_slice(b": ");
        if self.timestamps {
            let now = Local::now().format(TIMESTAMP_FORMAT).to_string();
            out.extend_from_slice(now.as_bytes());
            out.push(b' ');
        }
        out.extend_from_slice(line);
        out.push(b'\n');
        self.target.write_all(&out)
    }
}

impl Write for LineLogger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line[..pos])?;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(&line)?;
        }
        self.target.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_api::SharedBuffer;

    #[test]
    fn prefixes_each_line() {
        let buffer = SharedBuffer::new();
        let mut logger = LineLogger::new("server", buffer.sink());

        logger.write_all(b"one\ntwo\n").unwrap();

        assert_eq!(buffer.contents(), "server: one\nserver: two\n");
    }

    #[test]
    fn holds_partial_lines_until_newline() {
        let buffer = SharedBuffer::new();
        let mut logger = LineLogger::new("worker", buffer.sink());

        logger.write_all(b"hel").unwrap();
        assert!(buffer.is_empty());

        logger.write_all(b"lo\nwor").unwrap();
        assert_eq!(buffer.contents(), "worker: hello\n");

        logger.flush().unwrap();
        assert_eq!(buffer.contents(), "worker: hello\nworker: wor\n");
    }

    #[test]
    fn flush_without_pending_writes_nothing() {
        let buffer = SharedBuffer::new();
        let mut logger = LineLogger::new("idle", buffer.sink());
        logger.flush().unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn loggers_share_a_target() {
        let buffer = SharedBuffer::new();
        let mut a = LineLogger::new("a", buffer.sink()).into_sink();
        let mut b = LineLogger::new("b", buffer.sink()).into_sink();

        a.write_all(b"x").unwrap();
        b.write_all(b"y\n").unwrap();
        a.write_all(b"\n").unwrap();

        assert_eq!(buffer.contents(), "b: y\na: x\n");
    }

    #[test]
    fn timestamps_follow_label() {
        let buffer = SharedBuffer::new();
        let mut logger = LineLogger::new("web", buffer.sink()).with_timestamps(true);

        logger.write_all(b"ready\n").unwrap();

        let out = buffer.contents();
        assert!(out.starts_with("web: "));
        assert!(out.ends_with(" ready\n"));
        // "web: YYYY/MM/DD HH:MM:SS ready\n"
        assert_eq!(out.len(), "web: ".len() + 19 + " ready\n".len());
    }
}
