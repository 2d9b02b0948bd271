//! # Rotolog
//!
//! Rotolog provides composable [`std::io::Write`] decorators for processes
//! that log continuously for days: a self-rotating file writer that keeps
//! disk usage bounded, a collapsing writer that folds runs of identical
//! lines into a single `...xN` summary, and a timestamping writer that
//! prefixes every emitted line with the wall-clock time. The writers are
//! plain `io::Write` implementors, so they plug into anything that consumes
//! a writer, including `tracing_appender::non_blocking`.
//!
//! ## Example
//!
//! ```rust
//! use {
//!     rotolog::{collapsing_writer, Retention, RotatingWriterBuilder, RotationSize},
//!     std::io::Write,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = std::env::temp_dir().join("rotolog-doc");
//!     std::fs::create_dir_all(&dir)?;
//!     let rotating = RotatingWriterBuilder::new(dir.join("app.log"))
//!         .rotation_size(RotationSize::MB(10)) // Rotate once the file reaches 10 MB
//!         .retention(Retention::MaxFiles(5)) // Keep at most 5 rotated files
//!         .build()?;
//!     let mut log = collapsing_writer(rotating);
//!
//!     writeln!(log, "server started")?;
//!     writeln!(log, "listening on port 8080")?;
//!
//!     Ok(())
//! }
//! ```
use {
    chrono::Local,
    regex::Regex,
    std::{
        fs,
        io::{self, Write as _},
        path::{Path, PathBuf},
    },
};

/// Timestamp prefix applied by [`TimestampWriter`] to every payload.
const TIMESTAMP_FORMAT: &str = "[%Y-%m-%d %H:%M:%S] ";

/// Second-resolution stamp embedded in rotated file names. The format sorts
/// lexically in chronological order, which rotation history relies on.
const ROTATED_STAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Average line length assumed when estimating the line count of an already
/// existing log file at start-up.
const ESTIMATED_LINE_LENGTH: u64 = 200;

/// Defines size thresholds for rotating log files in various units.
///
/// When the active log file reaches the specified size, it is renamed to a
/// timestamped sibling and a fresh file is started. Byte-denominated units
/// are normalized to a byte threshold at construction:
///
/// * `Bytes` - Direct byte count (e.g., 1048576 bytes)
/// * `KB` - Kilobytes (1 KB = 1024 bytes)
/// * `MB` - Megabytes (1 MB = 1024 KB)
/// * `Lines` - Count of newline bytes written, instead of payload bytes
///
/// A threshold of zero disables rotation entirely; the file grows without
/// bound.
///
/// # Examples
/// ```
/// use rotolog::{RotatingWriterBuilder, RotationSize};
///
/// let dir = std::env::temp_dir().join("rotolog-doc-sizes");
/// std::fs::create_dir_all(&dir).unwrap();
///
/// // Rotate when the file reaches 100 MB
/// let writer = RotatingWriterBuilder::new(dir.join("large.log"))
///     .rotation_size(RotationSize::MB(100))
///     .build()
///     .unwrap();
///
/// // Rotate after 50_000 lines
/// let writer = RotatingWriterBuilder::new(dir.join("lines.log"))
///     .rotation_size(RotationSize::Lines(50_000))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub enum RotationSize {
    /// Raw byte count.
    Bytes(u64),
    /// Kilobytes (1 KB = 1024 bytes).
    KB(u64),
    /// Megabytes (1 MB = 1024 KB = 1,048,576 bytes).
    MB(u64),
    /// Number of newline bytes written. Line counting is approximate for
    /// file content that already existed at construction, see
    /// [`RotatingWriterBuilder::build`].
    Lines(u64),
}

impl RotationSize {
    /// Normalize to `(threshold, in_bytes)`: the threshold in the accounting
    /// unit plus whether that unit is bytes or lines.
    fn normalized(&self) -> (u64, bool) {
        match self {
            RotationSize::Bytes(b) => (*b, true),
            RotationSize::KB(kb) => (kb * 1024, true),
            RotationSize::MB(mb) => (mb * 1024 * 1024, true),
            RotationSize::Lines(n) => (*n, false),
        }
    }
}

/// Controls how many rotated log files are kept on disk.
///
/// Retention applies to rotated siblings of the active file, both those
/// produced during the current run and those recovered from the directory
/// at construction.
///
/// * `Unlimited` - Rotated files are never deleted.
/// * `MaxFiles(n)` - The oldest rotated files are deleted once `n` would be
///   reached, oldest first.
/// * `Disabled` - Logging is switched off entirely: writes are accepted and
///   reported as fully written, but nothing touches the disk, and any
///   recovered rotation history is deleted at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Never prune rotated files.
    Unlimited,
    /// Accept and discard all writes; delete recovered history.
    Disabled,
    /// Keep at most this many rotated files, pruning oldest first.
    MaxFiles(u64),
}

/// Errors that can occur while constructing a [`RotatingWriter`].
///
/// Once built, the writer reports failures through ordinary
/// [`std::io::Error`] values on `write`, or absorbs them into the log
/// stream itself (see [`RotatingWriter`]).
#[derive(Debug, thiserror::Error)]
pub enum RotologError {
    #[error("invalid log file path '{0}': not a regular file")]
    NotAFile(PathBuf),
    #[error("failed to list directory '{0}': {1}")]
    ListDirectory(PathBuf, String),
    #[error("file IO error: {0}")]
    FileIO(#[from] io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

/// A log file writer that rotates the file aside once it grows past a size
/// threshold and prunes the oldest rotated siblings beyond a retention cap.
///
/// Rotated files are named `<stem>.<YYYYMMDDTHHMMSS>.<ext>` next to the
/// active file, with a `.1`, `.2`, ... suffix when several rotations land
/// within the same second. At construction, files matching that pattern are
/// recovered as rotation history, so retention stays consistent across
/// process restarts.
///
/// Rotation and pruning failures during a `write` never fail the caller:
/// a one-line diagnostic is written into the log stream instead, and its
/// length is counted toward the rotation budget so repeated failures still
/// force further rotation attempts. Only opening the file or writing the
/// payload itself surfaces as an `Err`.
///
/// The writer is not internally synchronized; it assumes the process's
/// logging facility serializes all writes onto one stream. Wrap the whole
/// writer chain in a single mutex, or hand it to
/// `tracing_appender::non_blocking`, when sharing is needed.
#[derive(Debug)]
pub struct RotatingWriter {
    /// Path of the active log file, fixed for the writer's lifetime.
    path: PathBuf,
    retention: Retention,
    /// Rotation threshold in the accounting unit; zero disables rotation.
    max_size: u64,
    /// Whether `size` counts bytes (true) or newlines (false).
    in_bytes: bool,
    /// Accumulated size of the active file in the accounting unit.
    size: u64,
    /// The live append handle; `None` before the first write and right
    /// after a rotation.
    file: Option<fs::File>,
    /// Rotated sibling paths still on disk, oldest first.
    history: Vec<PathBuf>,
}

impl RotatingWriter {
    /// Recover rotation history from the target's parent directory.
    ///
    /// Matches exactly `<stem>.<8-digit date>T<6-digit time>.log(.<n>)*`
    /// against each entry; names that merely share a prefix or suffix with
    /// the stem are left alone.
    fn discover_history(&mut self) -> Result<(), RotologError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pattern = Regex::new(&format!(
            r"^{}\.\d{{8}}T\d{{6}}\.log(\.\d+)*$",
            regex::escape(&stem)
        ))
        .map_err(|err| RotologError::Internal(err.to_string()))?;

        let entries = fs::read_dir(dir)
            .map_err(|err| RotologError::ListDirectory(dir.to_path_buf(), err.to_string()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|err| RotologError::ListDirectory(dir.to_path_buf(), err.to_string()))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_owned());
            }
        }
        // Lexical order equals chronological order for the stamp format;
        // sort explicitly since read_dir order is platform dependent.
        names.sort();
        for name in names {
            if pattern.is_match(&name) {
                self.history.push(dir.join(name));
            }
        }
        Ok(())
    }

    /// Size of an already existing active file, in the accounting unit.
    ///
    /// In line mode the count is estimated as `byte_length / 200` instead
    /// of scanning the file, trading accuracy for cheap start-ups when
    /// reopening huge logs. The estimate only applies to pre-existing
    /// content; newlines written through this writer are counted exactly.
    fn initial_size(&self, byte_length: u64) -> u64 {
        if self.in_bytes {
            byte_length
        } else {
            byte_length / ESTIMATED_LINE_LENGTH
        }
    }

    /// Pick an unused rotated name for the active file: the stem plus a
    /// second-resolution stamp, with an incrementing numeric suffix when
    /// several rotations happen within the same second.
    fn rotated_path(&self) -> PathBuf {
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let base = format!(
            "{}.{}{ext}",
            self.path.with_extension("").to_string_lossy(),
            Local::now().format(ROTATED_STAMP_FORMAT)
        );
        let mut candidate = PathBuf::from(&base);
        let mut suffix = 0;
        while candidate.exists() {
            suffix += 1;
            candidate = PathBuf::from(format!("{base}.{suffix}"));
        }
        candidate
    }

    /// Close the active file and rename it aside under a timestamped name.
    ///
    /// The size counter is reset even when there is nothing to rename, so a
    /// rotation on a never-opened target is a plain reset.
    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        self.size = 0;
        if self.path.exists() {
            let target = self.rotated_path();
            fs::rename(&self.path, &target)?;
            self.history.push(target);
        }
        Ok(())
    }

    /// Delete the oldest rotated files until the retention bound holds.
    ///
    /// A deletion failure propagates immediately; the entry that failed to
    /// delete stays at the front of the history.
    fn prune(&mut self) -> io::Result<()> {
        let keep = match self.retention {
            Retention::Unlimited => return Ok(()),
            Retention::Disabled => 0,
            Retention::MaxFiles(n) => n,
        };
        while self.history.len() as u64 >= keep && !self.history.is_empty() {
            fs::remove_file(&self.history[0])?;
            self.history.remove(0);
        }
        Ok(())
    }

    /// Account a write against the rotation budget. Diagnostic lines count
    /// as one line each in line mode.
    fn bump_size(&mut self, written: usize) {
        if self.in_bytes {
            self.size += written as u64;
        } else {
            self.size += 1;
        }
    }

    /// Make a rotation-path failure visible in-band: write a one-line
    /// diagnostic into the active file instead of failing the caller's
    /// write. Rotation closes the handle before renaming, so reopen the
    /// file when necessary; everything here is best effort.
    fn absorb_failure(&mut self, action: &str, err: &io::Error) {
        let line = format!("failed to {action} log file: {err}\n");
        if self.file.is_none() {
            self.file = fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.path)
                .ok();
        }
        if let Some(file) = self.file.as_mut() {
            if let Ok(written) = file.write(line.as_bytes()) {
                self.bump_size(written);
            }
        }
    }

    /// Close the active file handle, if any. Idempotent: closing an already
    /// closed writer is a no-op returning `Ok(())`.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

impl io::Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.retention == Retention::Disabled {
            return Ok(buf.len());
        }
        if self.max_size > 0 && self.size >= self.max_size && self.file.is_some() {
            if let Err(err) = self.rotate() {
                self.absorb_failure("rotate", &err);
            }
            if let Err(err) = self.prune() {
                self.absorb_failure("prune", &err);
            }
        }
        if self.file.is_none() {
            let file = fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        let file = self.file.as_mut().expect("opened above");
        let written = file.write(buf)?;
        if self.in_bytes {
            self.size += written as u64;
        } else {
            self.size += line_count(buf);
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Number of newline bytes in the payload.
fn line_count(buf: &[u8]) -> u64 {
    buf.iter().filter(|&&b| b == b'\n').count() as u64
}

/// Provides a fluent interface for configuring [`RotatingWriter`] instances.
///
/// # Default configuration
///
/// If not explicitly configured:
/// * No rotation (the active file grows without bound)
/// * Unlimited retention
/// * The existing file is appended to, not truncated
///
/// # Examples
///
/// ```rust
/// use rotolog::{Retention, RotatingWriterBuilder, RotationSize};
///
/// let dir = std::env::temp_dir().join("rotolog-doc-builder");
/// std::fs::create_dir_all(&dir).unwrap();
/// let writer = RotatingWriterBuilder::new(dir.join("app.log"))
///     .rotation_size(RotationSize::KB(256))
///     .retention(Retention::MaxFiles(3))
///     .truncate(true) // Rotate any existing file aside before writing
///     .build()
///     .unwrap();
/// ```
pub struct RotatingWriterBuilder {
    path: PathBuf,
    retention: Retention,
    rotation: Option<RotationSize>,
    truncate: bool,
}

impl RotatingWriterBuilder {
    /// Create a new builder for the given log file path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        RotatingWriterBuilder {
            path: path.as_ref().to_path_buf(),
            retention: Retention::Unlimited,
            rotation: None,
            truncate: false,
        }
    }

    /// Set the retention policy for rotated files.
    pub fn retention(self, retention: Retention) -> Self {
        Self { retention, ..self }
    }

    /// Set the size threshold at which the active file is rotated.
    pub fn rotation_size(self, rotation: RotationSize) -> Self {
        Self {
            rotation: Some(rotation),
            ..self
        }
    }

    /// Rotate an already existing file aside at construction, so the writer
    /// starts on a fresh file instead of appending.
    pub fn truncate(self, truncate: bool) -> Self {
        Self { truncate, ..self }
    }

    /// Build the rotating writer.
    ///
    /// Recovers rotation history from the parent directory, sizes up any
    /// existing file (estimating `byte_length / 200` lines in line mode
    /// rather than scanning it), rotates it aside when [`truncate`] is set,
    /// prunes history down to the retention bound, and opens the file so
    /// immediate IO errors surface here rather than on the first write.
    ///
    /// [`truncate`]: RotatingWriterBuilder::truncate
    pub fn build(self) -> Result<RotatingWriter, RotologError> {
        let (max_size, in_bytes) = self.rotation.map_or((0, true), |r| r.normalized());
        let mut writer = RotatingWriter {
            path: self.path,
            retention: self.retention,
            max_size,
            in_bytes,
            size: 0,
            file: None,
            history: Vec::new(),
        };
        writer.discover_history()?;
        if let Ok(metadata) = fs::metadata(&writer.path) {
            if metadata.is_dir() {
                return Err(RotologError::NotAFile(writer.path));
            }
            writer.size = writer.initial_size(metadata.len());
            if self.truncate {
                writer.rotate()?;
            }
        }
        writer.prune()?;
        writer.write(&[])?;
        Ok(writer)
    }
}

/// Prefixes every payload with a `[YYYY-MM-DD HH:MM:SS] ` timestamp before
/// forwarding it to the wrapped writer.
///
/// The reported byte count covers only the caller's payload, never the
/// prefix: a short write that consumed less than the prefix reports zero,
/// and a full write reports exactly the payload length.
pub struct TimestampWriter<W> {
    inner: W,
}

impl<W> TimestampWriter<W> {
    /// Wrap a writer so every payload gets a timestamp prefix.
    pub fn new(inner: W) -> Self {
        TimestampWriter { inner }
    }

    /// Get a mutable reference to the wrapped writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwrap, returning the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> io::Write for TimestampWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let prefix = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut framed = Vec::with_capacity(prefix.len() + buf.len());
        framed.extend_from_slice(prefix.as_bytes());
        framed.extend_from_slice(buf);
        let written = self.inner.write(&framed)?;
        Ok(written.saturating_sub(prefix.len()))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Suppresses consecutive identical writes, replacing a run of duplicates
/// with a single ` ...xN\n` summary line.
///
/// A duplicate write is swallowed, not buffered: it reports zero bytes
/// written and nothing reaches the wrapped writer until a distinct payload
/// arrives. The summary counts the original occurrence plus the suppressed
/// repeats, so two suppressed duplicates yield ` ...x3`.
///
/// Because a suppressed write reports zero bytes, call `write` rather than
/// `write_all` when duplicates are expected; `write_all` treats a zero
/// count as [`std::io::ErrorKind::WriteZero`].
///
/// # Examples
///
/// ```rust
/// use {rotolog::CollapsingWriter, std::io::Write};
///
/// let mut log = CollapsingWriter::new(Vec::new());
/// log.write(b"ready").unwrap();
/// log.write(b"ready").unwrap(); // suppressed
/// log.write(b"ready").unwrap(); // suppressed
/// log.write(b"done").unwrap(); // emits " ...x3\n" then "done"
/// assert_eq!(log.into_inner(), b"ready ...x3\ndone");
/// ```
pub struct CollapsingWriter<W> {
    inner: W,
    /// Last distinct payload forwarded; duplicates are compared against it.
    last: Vec<u8>,
    /// Consecutive suppressed duplicates of `last` not yet summarized.
    repeats: u64,
}

impl<W> CollapsingWriter<W> {
    /// Wrap a writer so runs of identical payloads collapse into a summary.
    pub fn new(inner: W) -> Self {
        CollapsingWriter {
            inner,
            last: Vec::new(),
            repeats: 0,
        }
    }

    /// Get a mutable reference to the wrapped writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwrap, returning the wrapped writer. Any pending duplicate run is
    /// discarded without a summary.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> io::Write for CollapsingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf == self.last.as_slice() {
            self.repeats += 1;
            return Ok(0);
        }
        if self.repeats > 0 {
            // One write call per summary: write_fmt would forward each
            // format fragment separately, and decorators below prefix
            // every write.
            let summary = format!(" ...x{}\n", self.repeats + 1);
            let _ = self.inner.write(summary.as_bytes());
            self.repeats = 0;
        }
        self.last.clear();
        self.last.extend_from_slice(buf);
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Build the standard writer stack over a byte sink: duplicates collapse
/// first, then every distinct line (including the ` ...xN` summary line)
/// gets a timestamp prefix on its way to the sink.
///
/// # Examples
///
/// ```rust
/// use {
///     rotolog::{collapsing_writer, RotatingWriterBuilder, RotationSize},
///     std::io::Write,
/// };
///
/// let dir = std::env::temp_dir().join("rotolog-doc-stack");
/// std::fs::create_dir_all(&dir).unwrap();
/// let rotating = RotatingWriterBuilder::new(dir.join("app.log"))
///     .rotation_size(RotationSize::MB(1))
///     .build()
///     .unwrap();
/// let mut log = collapsing_writer(rotating);
/// writeln!(log, "starting up").unwrap();
/// ```
pub fn collapsing_writer<W: io::Write>(sink: W) -> CollapsingWriter<TimestampWriter<W>> {
    CollapsingWriter::new(TimestampWriter::new(sink))
}
