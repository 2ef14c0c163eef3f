//! # Authorization Audit Log
//!
//! Tamper-evident record of every authorization decision the CLI host makes.
//!
//! Entries are appended to `audit.jsonl`, one JSON object per line. Each entry
//! carries an HMAC-SHA256 over its own fields and the previous entry's HMAC,
//! so editing, dropping or reordering any entry breaks verification of
//! everything after it.
//!
//! ## Files
//!
//! ```text
//! <audit dir>/
//! ├── audit.key          (0600, 64 hex chars)
//! ├── audit.jsonl        live log
//! ├── audit.jsonl.1.gz   oldest rotated segment
//! └── audit.jsonl.2.gz
//! ```
//!
//! Rotated segments stay part of the chain: verification and state restore
//! read them in order before the live file.
//!
//! ## Example
//!
//! ```no_run
//! use sessiongate::audit::{AuditLogger, AuthorizationEvent};
//! use sessiongate_core::types::{Asset, AuthorizationResult, DenialReason, TransferRequest};
//! use alloy_primitives::{Address, U256};
//! use std::path::Path;
//!
//! let logger = AuditLogger::open(Path::new("/var/lib/sessiongate/audit"))?;
//!
//! let request = TransferRequest {
//!     account: Address::repeat_byte(1),
//!     signer: Address::repeat_byte(2),
//!     asset: Asset::Native,
//!     recipient: Address::repeat_byte(3),
//!     amount: U256::from(10u64),
//! };
//! let result = AuthorizationResult::Denied(DenialReason::PolicyNotFound);
//!
//! logger.log_authorization(AuthorizationEvent::new("abc123", &request, 1_700_000_000, &result))?;
//! assert!(logger.verify_chain()?.valid);
//! # Ok::<(), sessiongate::audit::AuditError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use chrono::{SecondsFormat, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sessiongate_core::types::{AuthorizationResult, Timestamp, TransferRequest};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default maximum live file size before rotation (10 MB).
const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Name of the live audit log file.
pub const AUDIT_LOG_FILENAME: &str = "audit.jsonl";

/// Name of the HMAC key file.
pub const AUDIT_KEY_FILENAME: &str = "audit.key";

/// Previous-HMAC value for the first entry of a chain.
const INITIAL_HMAC: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// ============================================================================
// Entries and Events
// ============================================================================

/// One line of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    /// Position in the chain, starting at 0 and never reset by rotation.
    pub seq: u64,

    /// Wall-clock time the entry was written (RFC 3339, UTC).
    pub timestamp: String,

    /// Correlation ID linking the entry to the host's tracing output.
    pub correlation_id: String,

    /// Account whose funds the transfer would move.
    pub account: String,

    /// Session signer that requested the transfer.
    pub signer: String,

    /// Asset, `native` or a token address.
    pub asset: String,

    /// Transfer recipient.
    pub recipient: String,

    /// Amount in the asset's smallest unit, as a decimal string.
    pub amount: String,

    /// The `now` the decision was evaluated at (Unix seconds).
    pub decision_time: Timestamp,

    /// `authorized` or `denied:<rule>:<reason>`.
    pub verdict: String,

    /// HMAC-SHA256 over this entry and the previous entry's HMAC.
    pub hmac: String,
}

impl AuditEntry {
    /// Canonical bytes covered by the entry's HMAC.
    fn mac_input(&self, prev_hmac: &str) -> String {
        [
            self.seq.to_string().as_str(),
            &self.timestamp,
            &self.correlation_id,
            &self.account,
            &self.signer,
            &self.asset,
            &self.recipient,
            &self.amount,
            self.decision_time.to_string().as_str(),
            &self.verdict,
            prev_hmac,
        ]
        .join("||")
    }
}

/// Outcome of an authorization, as recorded in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The transfer was authorized and its spend committed.
    Authorized,

    /// The transfer was denied.
    Denied {
        /// Machine-readable rule name.
        rule: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl Verdict {
    fn as_audit_string(&self) -> String {
        match self {
            Self::Authorized => "authorized".to_string(),
            Self::Denied { rule, reason } => format!("denied:{rule}:{reason}"),
        }
    }
}

impl From<&AuthorizationResult> for Verdict {
    fn from(result: &AuthorizationResult) -> Self {
        match result {
            AuthorizationResult::Authorized(_) => Self::Authorized,
            AuthorizationResult::Denied(reason) => Self::Denied {
                rule: reason.rule_name().to_string(),
                reason: reason.reason(),
            },
        }
    }
}

/// An authorization decision to be logged.
#[derive(Debug, Clone)]
pub struct AuthorizationEvent {
    /// Correlation ID for request tracing.
    pub correlation_id: String,

    /// The evaluated request.
    pub request: TransferRequest,

    /// The `now` the decision was evaluated at.
    pub decision_time: Timestamp,

    /// The decision.
    pub verdict: Verdict,
}

impl AuthorizationEvent {
    /// Builds an event from a request and the engine's result.
    #[must_use]
    pub fn new(
        correlation_id: impl Into<String>,
        request: &TransferRequest,
        decision_time: Timestamp,
        result: &AuthorizationResult,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            request: request.clone(),
            decision_time,
            verdict: Verdict::from(result),
        }
    }
}

// ============================================================================
// Verification Result
// ============================================================================

/// Result of walking the HMAC chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    /// Whether every entry verified.
    pub valid: bool,

    /// Number of entries verified before the first failure.
    pub entries_checked: u64,

    /// Sequence number of the first invalid entry.
    pub first_invalid_seq: Option<u64>,

    /// What went wrong at `first_invalid_seq`.
    pub error_message: Option<String>,
}

impl VerifyResult {
    const fn success(entries_checked: u64) -> Self {
        Self {
            valid: true,
            entries_checked,
            first_invalid_seq: None,
            error_message: None,
        }
    }

    fn failure(entries_checked: u64, first_invalid_seq: u64, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            entries_checked,
            first_invalid_seq: Some(first_invalid_seq),
            error_message: Some(message.into()),
        }
    }
}

// ============================================================================
// AuditError
// ============================================================================

/// Errors that can occur while writing or reading the audit log.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// I/O error on a log or key file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An entry could not be serialized or parsed.
    #[error("Failed to serialize entry: {0}")]
    Serialization(String),

    /// The key file does not exist.
    #[error("Audit key not found at {0}")]
    KeyNotFound(PathBuf),

    /// The key file has the wrong format.
    #[error("Invalid audit key: {0}")]
    InvalidKey(String),

    /// The existing chain failed verification while restoring state.
    #[error("Chain verification failed at seq {seq}: {message}")]
    ChainBroken {
        /// First invalid sequence number.
        seq: u64,
        /// Description of the failure.
        message: String,
    },

    /// Rotating the live file failed.
    #[error("Log rotation failed: {0}")]
    RotationFailed(String),

    /// The chain head mutex was poisoned.
    #[error("Lock error: {0}")]
    LockError(String),
}

// ============================================================================
// AuditLogger
// ============================================================================

/// Next position in the chain.
#[derive(Debug)]
struct ChainHead {
    next_seq: u64,
    last_hmac: String,
}

/// Thread-safe, HMAC-chained audit logger.
pub struct AuditLogger {
    log_dir: PathBuf,
    log_path: PathBuf,
    hmac_key: [u8; 32],
    head: Mutex<ChainHead>,
    max_file_size: u64,
}

impl AuditLogger {
    /// Creates a logger in `log_dir` with an explicit key.
    ///
    /// An existing chain is verified and continued.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::ChainBroken`] if the existing chain does not
    /// verify under `hmac_key`, or an I/O error.
    pub fn new(log_dir: &Path, hmac_key: &[u8; 32]) -> Result<Self, AuditError> {
        fs::create_dir_all(log_dir)?;

        let state = walk_chain(log_dir, hmac_key)?;
        if let Some((seq, message)) = state.failure {
            return Err(AuditError::ChainBroken { seq, message });
        }

        Ok(Self {
            log_dir: log_dir.to_path_buf(),
            log_path: log_dir.join(AUDIT_LOG_FILENAME),
            hmac_key: *hmac_key,
            head: Mutex::new(ChainHead {
                next_seq: state.entries,
                last_hmac: state.last_hmac,
            }),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        })
    }

    /// Opens the logger in `log_dir`, creating `audit.key` if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the key cannot be read or created, or the
    /// existing chain is broken.
    pub fn open(log_dir: &Path) -> Result<Self, AuditError> {
        let key_path = log_dir.join(AUDIT_KEY_FILENAME);
        let key = if key_path.exists() {
            read_key(&key_path)?
        } else {
            create_key(log_dir)?
        };
        Self::new(log_dir, &key)
    }

    /// Opens the logger in `log_dir`, requiring an existing `audit.key`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::KeyNotFound`] if there is no key file.
    pub fn open_existing(log_dir: &Path) -> Result<Self, AuditError> {
        let key = read_key(&log_dir.join(AUDIT_KEY_FILENAME))?;
        Self::new(log_dir, &key)
    }

    /// Sets the live file size that triggers rotation.
    #[must_use]
    pub const fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Path of the live log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Appends an authorization decision to the chain.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if rotation or the append fails. The chain head
    /// only advances after the line is flushed.
    #[allow(clippy::significant_drop_tightening)]
    pub fn log_authorization(&self, event: AuthorizationEvent) -> Result<AuditEntry, AuditError> {
        let mut head = self
            .head
            .lock()
            .map_err(|e| AuditError::LockError(e.to_string()))?;

        self.rotate_if_needed()?;

        let request = &event.request;
        let mut entry = AuditEntry {
            seq: head.next_seq,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            correlation_id: event.correlation_id,
            account: request.account.to_string(),
            signer: request.signer.to_string(),
            asset: request.asset.to_string(),
            recipient: request.recipient.to_string(),
            amount: request.amount.to_string(),
            decision_time: event.decision_time,
            verdict: event.verdict.as_audit_string(),
            hmac: String::new(),
        };
        entry.hmac = chain_hmac(&self.hmac_key, &entry, &head.last_hmac)?;

        let json =
            serde_json::to_string(&entry).map_err(|e| AuditError::Serialization(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{json}")?;
        file.flush()?;

        head.next_seq += 1;
        head.last_hmac.clone_from(&entry.hmac);

        Ok(entry)
    }

    /// Verifies the whole chain, rotated segments included.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if a file cannot be read. Tampering is reported
    /// through [`VerifyResult`], not as an error.
    pub fn verify_chain(&self) -> Result<VerifyResult, AuditError> {
        let state = walk_chain(&self.log_dir, &self.hmac_key)?;
        Ok(match state.failure {
            None => VerifyResult::success(state.entries),
            Some((seq, message)) => VerifyResult::failure(state.entries, seq, message),
        })
    }

    fn rotate_if_needed(&self) -> Result<(), AuditError> {
        let size = match fs::metadata(&self.log_path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(AuditError::Io(e)),
        };
        if size < self.max_file_size {
            return Ok(());
        }

        let rotated_path = archive_path(&self.log_dir, archive_count(&self.log_dir) + 1);
        let content = fs::read(&self.log_path)
            .map_err(|e| AuditError::RotationFailed(format!("Failed to read log: {e}")))?;

        let gz_file = File::create(&rotated_path)
            .map_err(|e| AuditError::RotationFailed(format!("Failed to create gz file: {e}")))?;
        let mut encoder = GzEncoder::new(BufWriter::new(gz_file), Compression::default());
        encoder
            .write_all(&content)
            .map_err(|e| AuditError::RotationFailed(format!("Failed to write gz: {e}")))?;
        encoder
            .finish()
            .and_then(|mut writer| writer.flush())
            .map_err(|e| AuditError::RotationFailed(format!("Failed to finish gz: {e}")))?;

        File::create(&self.log_path)
            .map_err(|e| AuditError::RotationFailed(format!("Failed to truncate log: {e}")))?;

        tracing::info!(rotated_to = %rotated_path.display(), "Audit log rotated");
        Ok(())
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("log_path", &self.log_path)
            .field("max_file_size", &self.max_file_size)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Key Handling
// ============================================================================

/// Generates a fresh key and writes it to `<log_dir>/audit.key` as hex.
///
/// # Errors
///
/// Returns [`AuditError::Io`] if the directory or key file cannot be written.
pub fn create_key(log_dir: &Path) -> Result<[u8; 32], AuditError> {
    fs::create_dir_all(log_dir)?;

    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);

    let key_path = log_dir.join(AUDIT_KEY_FILENAME);
    fs::write(&key_path, format!("{}\n", hex::encode(key)))?;

    #[cfg(unix)]
    fs::set_permissions(&key_path, fs::Permissions::from_mode(0o600))?;

    Ok(key)
}

fn read_key(key_path: &Path) -> Result<[u8; 32], AuditError> {
    let data = fs::read(key_path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            AuditError::KeyNotFound(key_path.to_path_buf())
        } else {
            AuditError::Io(e)
        }
    })?;
    parse_key(&data)
}

/// Accepts raw 32 bytes or 64 hex characters with optional whitespace.
fn parse_key(data: &[u8]) -> Result<[u8; 32], AuditError> {
    if let Ok(raw) = <[u8; 32]>::try_from(data) {
        return Ok(raw);
    }

    let text = String::from_utf8_lossy(data);
    let bytes = hex::decode(text.trim())
        .map_err(|e| AuditError::InvalidKey(format!("Invalid hex: {e}")))?;

    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        AuditError::InvalidKey(format!(
            "Key must be 32 bytes or 64 hex characters, got {} bytes",
            data.len()
        ))
    })
}

// ============================================================================
// Chain Walking
// ============================================================================

fn chain_hmac(key: &[u8; 32], entry: &AuditEntry, prev_hmac: &str) -> Result<String, AuditError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| AuditError::InvalidKey(e.to_string()))?;
    mac.update(entry.mac_input(prev_hmac).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn archive_path(log_dir: &Path, index: usize) -> PathBuf {
    log_dir.join(format!("{AUDIT_LOG_FILENAME}.{index}.gz"))
}

fn archive_count(log_dir: &Path) -> usize {
    (1..)
        .take_while(|&index| archive_path(log_dir, index).exists())
        .count()
}

/// Chain files in order: rotated archives, then the live file.
fn chain_segments(log_dir: &Path) -> Vec<PathBuf> {
    let mut segments: Vec<PathBuf> = (1..=archive_count(log_dir))
        .map(|index| archive_path(log_dir, index))
        .collect();
    let live = log_dir.join(AUDIT_LOG_FILENAME);
    if live.exists() {
        segments.push(live);
    }
    segments
}

fn open_segment(path: &Path) -> Result<Box<dyn BufRead>, AuditError> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[derive(Debug)]
struct ChainState {
    entries: u64,
    last_hmac: String,
    failure: Option<(u64, String)>,
}

fn walk_chain(log_dir: &Path, key: &[u8; 32]) -> Result<ChainState, AuditError> {
    let mut state = ChainState {
        entries: 0,
        last_hmac: INITIAL_HMAC.to_string(),
        failure: None,
    };

    for segment in chain_segments(log_dir) {
        let reader = open_segment(&segment)?;
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                AuditError::Serialization(format!(
                    "{} line {}: {e}",
                    segment.display(),
                    line_num + 1
                ))
            })?;

            if entry.seq != state.entries {
                state.failure = Some((
                    entry.seq,
                    format!(
                        "Sequence mismatch: expected {}, got {}",
                        state.entries, entry.seq
                    ),
                ));
                return Ok(state);
            }

            if entry.hmac != chain_hmac(key, &entry, &state.last_hmac)? {
                state.failure = Some((
                    entry.seq,
                    "HMAC mismatch: entry may have been tampered with".to_string(),
                ));
                return Ok(state);
            }

            state.entries += 1;
            state.last_hmac = entry.hmac;
        }
    }

    Ok(state)
}
