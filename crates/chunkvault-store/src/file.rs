use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chunkvault_types::RecordId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::record::StoredRecord;
use crate::traits::RecordStore;

/// Flush/sync strategy for the record log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// `fsync` after every write call (safest, highest latency).
    EveryWrite,
    /// Flush to the OS and rely on page-cache buffering.
    OsDefault,
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::OsDefault
    }
}

/// Configuration for [`FileRecordStore`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// Sync/flush strategy.
    pub sync_mode: SyncMode,
    /// Compact automatically once superseded log bytes exceed this amount.
    /// `None` leaves compaction to explicit [`FileRecordStore::compact`] calls.
    pub auto_compact_bytes: Option<u64>,
}

/// Outcome of a log compaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompactionStats {
    /// Records carried over into the new log.
    pub live_records: usize,
    /// Log bytes dropped.
    pub reclaimed_bytes: u64,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

/// Log entry as written. Serializes identically to [`LogEntry`].
#[derive(Serialize)]
enum LogEntryRef<'a> {
    Put(&'a StoredRecord),
    Delete(&'a RecordId),
}

/// Log entry as read back.
#[derive(Deserialize)]
enum LogEntry {
    Put(StoredRecord),
    Delete(RecordId),
}

/// Position of a framed entry inside the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Slot {
    offset: u64,
    /// Framed length, header included.
    len: u64,
}

struct LogState {
    writer: BufWriter<File>,
    /// Current end of the log.
    offset: u64,
    /// Latest `Put` slot for every live record.
    index: HashMap<RecordId, Slot>,
    /// Bytes held by superseded, deleted or unreadable entries.
    dead_bytes: u64,
}

impl LogState {
    fn install(&mut self, id: RecordId, slot: Slot) {
        if let Some(old) = self.index.insert(id, slot) {
            self.dead_bytes += old.len;
        }
    }
}

struct Replay {
    index: HashMap<RecordId, Slot>,
    valid_len: u64,
    dead_bytes: u64,
}

/// Append-only, crash-recoverable record store backed by a single log file.
///
/// Every write appends a framed entry:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized Put(record) or Delete(id))]
/// ```
/// Only an offset index is kept in memory; record payloads are read from
/// disk on every `read`. On open the log is replayed front-to-back: entries
/// failing the CRC check are skipped and a torn tail is truncated away.
/// Superseded entries stay in the log until [`compact`](Self::compact)
/// rewrites it.
pub struct FileRecordStore {
    path: PathBuf,
    config: FileStoreConfig,
    state: Mutex<LogState>,
}

impl FileRecordStore {
    /// Open (or create) a record log at the given path.
    pub fn open(path: &Path, config: FileStoreConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let replay = replay(path)?;
        let file_len = file.metadata()?.len();
        if replay.valid_len < file_len {
            warn!(
                valid_len = replay.valid_len,
                file_len, "truncating torn record log tail"
            );
            file.set_len(replay.valid_len)?;
        }

        info!(
            path = %path.display(),
            records = replay.index.len(),
            dead_bytes = replay.dead_bytes,
            "record log opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            state: Mutex::new(LogState {
                writer: BufWriter::new(file),
                offset: replay.valid_len,
                index: replay.index,
                dead_bytes: replay.dead_bytes,
            }),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.lock().index.len()
    }

    /// Returns `true` if no live records exist.
    pub fn is_empty(&self) -> bool {
        self.lock().index.is_empty()
    }

    /// Current size of the log in bytes.
    pub fn log_size(&self) -> u64 {
        self.lock().offset
    }

    /// Log bytes that compaction would reclaim.
    pub fn dead_bytes(&self) -> u64 {
        self.lock().dead_bytes
    }

    /// Rewrite the log so it holds exactly one entry per live record.
    ///
    /// The new log is written beside the old one, synced, then renamed over
    /// it, so a crash mid-compaction leaves the old log intact.
    pub fn compact(&self) -> StoreResult<CompactionStats> {
        let mut state = self.lock();
        self.compact_locked(&mut state)
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().expect("record log mutex poisoned")
    }

    fn append_entry(state: &mut LogState, entry: &LogEntryRef<'_>) -> StoreResult<Slot> {
        let payload =
            bincode::serialize(entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len()).map_err(|_| {
            StoreError::Serialization(format!(
                "log entry of {} bytes exceeds the frame limit",
                payload.len()
            ))
        })?;
        let crc = crc32fast::hash(&payload);

        state.writer.write_all(&length.to_le_bytes())?;
        state.writer.write_all(&crc.to_le_bytes())?;
        state.writer.write_all(&payload)?;

        let slot = Slot {
            offset: state.offset,
            len: HEADER_SIZE + payload.len() as u64,
        };
        state.offset += slot.len;
        Ok(slot)
    }

    fn finish(&self, state: &mut LogState) -> StoreResult<()> {
        state.writer.flush()?;
        if matches!(self.config.sync_mode, SyncMode::EveryWrite) {
            state.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Append `entries` and flush them as one unit.
    ///
    /// On any failure the log is cut back to where it stood before the call,
    /// so no partial frame survives into later writes or a replay.
    fn commit(&self, state: &mut LogState, entries: &[LogEntryRef<'_>]) -> StoreResult<Vec<Slot>> {
        let start = state.offset;
        match self.append_entries(state, entries) {
            Ok(slots) => Ok(slots),
            Err(e) => {
                if let Err(reset) = self.rollback(state, start) {
                    warn!(offset = start, error = %reset, "failed to roll back record log");
                }
                Err(e)
            }
        }
    }

    fn append_entries(
        &self,
        state: &mut LogState,
        entries: &[LogEntryRef<'_>],
    ) -> StoreResult<Vec<Slot>> {
        let mut slots = Vec::with_capacity(entries.len());
        for entry in entries {
            slots.push(Self::append_entry(state, entry)?);
        }
        self.finish(state)?;
        Ok(slots)
    }

    /// Discard unflushed bytes and truncate the log to `offset`.
    fn rollback(&self, state: &mut LogState, offset: u64) -> StoreResult<()> {
        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        let stale = std::mem::replace(&mut state.writer, BufWriter::new(file));
        // Dropping the parts instead of the writer skips its flush-on-drop.
        let _ = stale.into_parts();
        state.writer.get_ref().set_len(offset)?;
        state.offset = offset;
        warn!(offset, "record log rolled back after failed write");
        Ok(())
    }

    /// Compact once the dead-byte threshold is crossed. A failure here does
    /// not undo the write that triggered it, so it is logged, not returned.
    fn maybe_compact(&self, state: &mut LogState) {
        if let Some(limit) = self.config.auto_compact_bytes {
            if state.dead_bytes > limit {
                if let Err(e) = self.compact_locked(state) {
                    warn!(error = %e, dead_bytes = state.dead_bytes, "automatic compaction failed");
                }
            }
        }
    }

    fn compact_locked(&self, state: &mut LogState) -> StoreResult<CompactionStats> {
        let before = state.offset;
        let tmp_path = self.path.with_extension("compact");

        let mut live: Vec<(RecordId, Slot)> =
            state.index.iter().map(|(id, slot)| (*id, *slot)).collect();
        live.sort_by_key(|(_, slot)| slot.offset);

        let mut source = BufReader::new(File::open(&self.path)?);
        let mut out = BufWriter::new(File::create(&tmp_path)?);
        let mut index = HashMap::with_capacity(live.len());
        let mut offset = 0u64;

        for (id, slot) in live {
            let frame = read_frame(&mut source, slot)?;
            out.write_all(&frame)?;
            index.insert(id, Slot { offset, len: slot.len });
            offset += slot.len;
        }

        out.flush()?;
        out.get_ref().sync_all()?;
        drop(out);
        fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        state.writer = BufWriter::new(file);
        state.offset = offset;
        state.index = index;
        state.dead_bytes = 0;

        let stats = CompactionStats {
            live_records: state.index.len(),
            reclaimed_bytes: before.saturating_sub(offset),
        };
        info!(
            live = stats.live_records,
            reclaimed = stats.reclaimed_bytes,
            "record log compacted"
        );
        Ok(stats)
    }
}

impl RecordStore for FileRecordStore {
    fn read(&self, id: &RecordId) -> StoreResult<Option<StoredRecord>> {
        let state = self.lock();
        let Some(slot) = state.index.get(id).copied() else {
            return Ok(None);
        };

        let mut file = BufReader::new(File::open(&self.path)?);
        let frame = read_frame(&mut file, slot)?;
        let entry = bincode::deserialize::<LogEntry>(&frame[HEADER_SIZE as usize..])
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        match entry {
            LogEntry::Put(record) if record.id == *id => Ok(Some(record)),
            LogEntry::Put(record) => Err(StoreError::CorruptRecord {
                id: *id,
                offset: slot.offset,
                reason: format!("slot holds record {}", record.id),
            }),
            LogEntry::Delete(_) => Err(StoreError::CorruptRecord {
                id: *id,
                offset: slot.offset,
                reason: "slot holds a delete marker".into(),
            }),
        }
    }

    fn write(&self, record: &StoredRecord) -> StoreResult<()> {
        let mut state = self.lock();
        let slots = self.commit(&mut state, &[LogEntryRef::Put(record)])?;
        let slot = slots[0];
        state.install(record.id, slot);

        debug!(id = %record.id, kind = %record.kind, offset = slot.offset, "record written");
        self.maybe_compact(&mut state);
        Ok(())
    }

    fn exists(&self, id: &RecordId) -> StoreResult<bool> {
        Ok(self.lock().index.contains_key(id))
    }

    fn delete(&self, id: &RecordId) -> StoreResult<bool> {
        let mut state = self.lock();
        if !state.index.contains_key(id) {
            return Ok(false);
        }

        let slots = self.commit(&mut state, &[LogEntryRef::Delete(id)])?;
        if let Some(old) = state.index.remove(id) {
            state.dead_bytes += old.len;
        }
        state.dead_bytes += slots[0].len;

        debug!(id = %id, "record deleted");
        self.maybe_compact(&mut state);
        Ok(true)
    }

    fn write_batch(&self, records: &[StoredRecord]) -> StoreResult<()> {
        let entries: Vec<LogEntryRef<'_>> = records.iter().map(LogEntryRef::Put).collect();
        let mut state = self.lock();
        let slots = self.commit(&mut state, &entries)?;
        for (record, slot) in records.iter().zip(slots) {
            state.install(record.id, slot);
        }

        debug!(count = records.len(), "record batch written");
        self.maybe_compact(&mut state);
        Ok(())
    }
}

impl std::fmt::Debug for FileRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("FileRecordStore")
            .field("path", &self.path)
            .field("record_count", &state.index.len())
            .field("log_size", &state.offset)
            .finish()
    }
}

/// Read one framed entry (header included) and verify its CRC.
fn read_frame<R: Read + Seek>(reader: &mut R, slot: Slot) -> StoreResult<Vec<u8>> {
    reader.seek(SeekFrom::Start(slot.offset))?;
    let mut frame = vec![0u8; slot.len as usize];
    reader.read_exact(&mut frame)?;

    let (length, expected) = decode_header(&frame[..HEADER_SIZE as usize]);
    if HEADER_SIZE + u64::from(length) != slot.len {
        return Err(StoreError::Serialization(format!(
            "frame length {length} at offset {} does not match index",
            slot.offset
        )));
    }

    let actual = crc32fast::hash(&frame[HEADER_SIZE as usize..]);
    if actual != expected {
        return Err(StoreError::CrcMismatch {
            offset: slot.offset,
            expected,
            actual,
        });
    }
    Ok(frame)
}

fn decode_header(header: &[u8]) -> (u32, u32) {
    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    (length, crc)
}

/// Rebuild the offset index by scanning the log front-to-back.
fn replay(path: &Path) -> StoreResult<Replay> {
    let mut file = BufReader::new(File::open(path)?);
    let file_len = file.get_ref().metadata()?.len();
    let mut index: HashMap<RecordId, Slot> = HashMap::new();
    let mut dead_bytes = 0u64;
    let mut offset = 0u64;

    while offset + HEADER_SIZE <= file_len {
        file.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let (length, expected) = decode_header(&header);
        let framed = HEADER_SIZE + u64::from(length);

        if length == 0 || offset + framed > file_len {
            warn!(offset, length, file_len, "invalid record log entry length; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        file.read_exact(&mut payload)?;

        let actual = crc32fast::hash(&payload);
        if actual != expected {
            warn!(
                offset,
                expected = expected,
                actual = actual,
                "CRC mismatch; skipping record log entry"
            );
            dead_bytes += framed;
            offset += framed;
            continue;
        }

        match bincode::deserialize::<LogEntry>(&payload) {
            Ok(LogEntry::Put(record)) => {
                let slot = Slot { offset, len: framed };
                if let Some(old) = index.insert(record.id, slot) {
                    dead_bytes += old.len;
                }
            }
            Ok(LogEntry::Delete(id)) => {
                if let Some(old) = index.remove(&id) {
                    dead_bytes += old.len;
                }
                dead_bytes += framed;
            }
            Err(e) => {
                warn!(offset, error = %e, "failed to decode record log entry; skipping");
                dead_bytes += framed;
            }
        }

        offset += framed;
    }

    debug!(records = index.len(), valid_len = offset, "record log replay complete");
    Ok(Replay {
        index,
        valid_len: offset,
        dead_bytes,
    })
}
