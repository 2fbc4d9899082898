// System
use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

// Third Party
use tracing_subscriber::fmt::MakeWriter;

// Local
use crate::{
    config::{LogOut, LogSettings},
    error::Error,
};

/// Somewhere serialized notifications can be written to, one line per record.
pub trait RecordSink {
    /// Write `record` followed by a newline. The record must be on its way to the destination
    /// when this returns.
    fn write_record(&mut self, record: &[u8]) -> io::Result<()>;
}

enum Destination {
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    File(BufWriter<File>),
    Closed,
}

impl Destination {
    fn writer(&mut self) -> Option<&mut dyn Write> {
        match self {
            Destination::Stdout(out) => Some(out as &mut dyn Write),
            Destination::Stderr(out) => Some(out as &mut dyn Write),
            Destination::File(out) => Some(out as &mut dyn Write),
            Destination::Closed => None,
        }
    }
}

/// The configured log destination, shared between the record writer, the diagnostic logger and
/// the shutdown coordinator.
///
/// Once closed, records can no longer be written, and diagnostics fall back to stderr so that
/// problems during shutdown stay visible.
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<Destination>>,
}

impl SharedSink {
    fn new(destination: Destination) -> Self {
        Self {
            inner: Arc::new(Mutex::new(destination)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Destination::Stdout(io::stdout()))
    }

    pub fn stderr() -> Self {
        Self::new(Destination::Stderr(io::stderr()))
    }

    /// Open `path` for appending, creating it if needed.
    pub fn file(path: &Path) -> Result<Self, Error> {
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let file = options.open(path).map_err(|source| Error::SinkOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(Destination::File(BufWriter::new(file))))
    }

    pub fn open(settings: &LogSettings) -> Result<Self, Error> {
        match settings.out {
            LogOut::Stdout => Ok(Self::stdout()),
            LogOut::Stderr => Ok(Self::stderr()),
            LogOut::File => Self::file(&settings.filename),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Destination> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), Destination::Closed)
    }

    /// Flush pending writes and release the destination if it is a file.
    ///
    /// Returns `true` when a file was closed by this call. Console streams are only flushed and
    /// stay usable; closing an already closed sink does nothing.
    pub fn close(&self) -> io::Result<bool> {
        let mut destination = self.lock();
        match std::mem::replace(&mut *destination, Destination::Closed) {
            Destination::File(writer) => {
                let file = writer.into_inner().map_err(|e| e.into_error())?;
                file.sync_all()?;
                Ok(true)
            }
            Destination::Closed => Ok(false),
            mut console => {
                let flushed = console.writer().map_or(Ok(()), |out| out.flush());
                *destination = console;
                flushed.map(|_| false)
            }
        }
    }
}

impl RecordSink for SharedSink {
    fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        let mut destination = self.lock();
        let out = destination
            .writer()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "record sink is closed"))?;
        out.write_all(record)?;
        out.write_all(b"\n")?;
        out.flush()
    }
}

/// Diagnostic output from the logger.
impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.lock().writer() {
            Some(out) => {
                let written = out.write(buf)?;
                out.flush()?;
                Ok(written)
            }
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock().writer() {
            Some(out) => out.flush(),
            None => io::stderr().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for SharedSink {
    type Writer = SharedSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    // System
    use std::{fs, io::Write};

    // Third Party
    use tempfile::TempDir;

    // Local
    use super::{RecordSink, SharedSink};

    #[test]
    fn test_file_sink_appends_records_and_closes_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        fs::write(&path, "existing\n").unwrap();

        let mut sink = SharedSink::file(&path).unwrap();
        sink.write_record(br#"{"type":"ADDED"}"#).unwrap();
        sink.write_record(br#"{"type":"MODIFIED"}"#).unwrap();

        // records are flushed as they are written
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "existing\n{\"type\":\"ADDED\"}\n{\"type\":\"MODIFIED\"}\n"
        );

        assert!(sink.close().unwrap());
        assert!(sink.is_closed());
        assert!(!sink.close().unwrap());

        let error = sink.write_record(b"{}").unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::BrokenPipe);
        // diagnostics after close go to stderr instead of failing
        assert!(sink.write(b"after close\n").is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), contents);
    }

    #[test]
    fn test_diagnostics_reach_the_file_without_a_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        let mut sink = SharedSink::file(&path).unwrap();

        sink.write_all(b"{\"level\":\"WARN\",\"message\":\"Watcher timed out.\"}\n")
            .unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\"level\":\"WARN\",\"message\":\"Watcher timed out.\"}\n"
        );
        assert!(!sink.is_closed());
    }

    #[test]
    fn test_console_sink_stays_open_after_close() {
        let mut sink = SharedSink::stderr();
        assert!(!sink.close().unwrap());
        assert!(!sink.is_closed());
        assert!(sink.write_record(b"{}").is_ok());
    }

    #[test]
    fn test_unopenable_log_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("events.log");
        let error = match SharedSink::file(&path) {
            Ok(_) => panic!("opening {} should fail", path.display()),
            Err(error) => error,
        };
        assert!(error.to_string().contains("failed to open log file"));
    }
}
