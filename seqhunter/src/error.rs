//! Result and error types for all seqhunter code.

use std::fmt;
use std::io;

#[allow(missing_docs)]
pub type SeqHunterResult<T> = Result<T, SeqHunterError>;

/// Error kinds named in spec section 7. `OutOfMemory`, `InvalidQueries`,
/// `InvalidDatabase` and `SeqSrc` are fatal: the scheduler cancels
/// remaining work and re-raises on the main thread. `NoValidKarlinAltschul`
/// and `AccessionNotFound` are recoverable and collected as warnings.
#[derive(Debug)]
pub enum SeqHunterError {
    OutOfMemory(String),
    InvalidArgument(String),
    InvalidQueries(String),
    InvalidDatabase(String),
    IdealStatParamCalc(String),
    NoValidKarlinAltschul(String),
    Interrupted,
    SeqSrc(String),
    AccessionNotFound(String),
    Io(io::Error),
    Serialize(bincode::Error),
}

impl SeqHunterError {
    /// Fatal errors abort the run; non-fatal ones are collected as
    /// warnings and logged once at the end (spec section 7 "Propagation").
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SeqHunterError::NoValidKarlinAltschul(_)
                | SeqHunterError::AccessionNotFound(_)
                | SeqHunterError::Interrupted
        )
    }
}

impl fmt::Display for SeqHunterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeqHunterError::OutOfMemory(m) => write!(f, "Error: out of memory: {m}"),
            SeqHunterError::InvalidArgument(m) => write!(f, "Error: invalid argument: {m}"),
            SeqHunterError::InvalidQueries(m) => write!(f, "Error: {m}"),
            SeqHunterError::InvalidDatabase(m) => write!(f, "Error: invalid database: {m}"),
            SeqHunterError::IdealStatParamCalc(m) => {
                write!(f, "Error: could not compute Karlin-Altschul parameters: {m}")
            }
            SeqHunterError::NoValidKarlinAltschul(m) => {
                write!(f, "Warning: no valid Karlin-Altschul parameters for {m}")
            }
            SeqHunterError::Interrupted => write!(f, "Search was interrupted"),
            SeqHunterError::SeqSrc(m) => write!(f, "Error: failed to retrieve sequence: {m}"),
            SeqHunterError::AccessionNotFound(m) => write!(f, "Warning: accession not found: {m}"),
            SeqHunterError::Io(e) => write!(f, "Error: I/O problem: {e}"),
            SeqHunterError::Serialize(e) => write!(f, "Error: unable to serialize/deserialize: {e}"),
        }
    }
}

impl std::error::Error for SeqHunterError {}

impl From<io::Error> for SeqHunterError {
    fn from(e: io::Error) -> Self {
        SeqHunterError::Io(e)
    }
}

impl From<bincode::Error> for SeqHunterError {
    fn from(e: bincode::Error) -> Self {
        SeqHunterError::Serialize(e)
    }
}

/// Warnings accumulated during a run and flushed once at the end, rather
/// than interleaved per-query (spec section 7).
#[derive(Default)]
pub struct WarningLog {
    warnings: std::sync::Mutex<Vec<String>>,
}

impl WarningLog {
    pub fn new() -> Self {
        WarningLog::default()
    }

    pub fn push(&self, msg: impl Into<String>) {
        self.warnings.lock().unwrap().push(msg.into());
    }

    pub fn flush(&self) {
        let warnings = self.warnings.lock().unwrap();
        for w in warnings.iter() {
            log::warn!("{w}");
        }
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Aggregates fatal errors raised by leaf workers (spec section 7
/// "Propagation"): the scheduler locks this, appends, cancels remaining
/// work, and re-raises the first fatal error on the main thread.
#[derive(Default)]
pub struct FatalErrors {
    errors: std::sync::Mutex<Vec<SeqHunterError>>,
}

impl FatalErrors {
    pub fn new() -> Self {
        FatalErrors::default()
    }

    pub fn report(&self, err: SeqHunterError) {
        self.errors.lock().unwrap().push(err);
    }

    pub fn has_any(&self) -> bool {
        !self.errors.lock().unwrap().is_empty()
    }

    pub fn take_first(&self) -> Option<SeqHunterError> {
        self.errors.lock().unwrap().drain(..).next()
    }
}
