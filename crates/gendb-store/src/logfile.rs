//! Legacy keyed-file backend.
//!
//! State lives in memory and every mutation is appended to a single log
//! file, which is replayed on open. Each record is framed as:
//!
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized LogRecord)]
//! ```
//!
//! Replay skips records whose CRC does not match and stops at the first
//! torn record; the torn tail is cut off so new records follow the last
//! good one. There is no rollback: an aborted transaction's writes stay
//! in the log.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gendb_types::{GrampsId, Handle, ObjectRef, ObjectType, ReferenceEdge};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};
use crate::memory::{InMemoryBackend, SnapshotItem};
use crate::traits::{BackendKind, RawRow, StorageBackend};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// One replayable mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum LogRecord {
    Put(ObjectType, RawRow),
    Delete(ObjectType, Handle),
    ReplaceRefs(ObjectRef, Vec<ObjectRef>),
    DeleteRefsFrom(Handle),
    ClearRefs,
    Metadata(String, String),
    NameGroup(String, Option<String>),
}

struct LogWriter {
    writer: BufWriter<File>,
    offset: u64,
}

pub struct LogFileBackend {
    path: PathBuf,
    state: InMemoryBackend,
    writer: Option<Mutex<LogWriter>>,
    sync_mode: SyncMode,
}

impl LogFileBackend {
    /// Open (or create) a log file and replay it.
    pub fn open(path: &Path, read_only: bool, sync_mode: SyncMode) -> StoreResult<Self> {
        let state = InMemoryBackend::new();
        let valid_len = if path.exists() {
            replay(path, &state)?
        } else if read_only {
            return Err(StoreError::io(
                path,
                io::Error::new(io::ErrorKind::NotFound, "log file does not exist"),
            ));
        } else {
            0
        };

        let writer = if read_only {
            None
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)
                .map_err(|e| StoreError::io(path, e))?;
            let file_len = file.metadata().map_err(|e| StoreError::io(path, e))?.len();
            if file_len > valid_len {
                warn!(path = %path.display(), file_len, valid_len, "cutting torn tail from log");
                file.set_len(valid_len).map_err(|e| StoreError::io(path, e))?;
            }
            let mut writer = BufWriter::new(file);
            std::io::Seek::seek(&mut writer, io::SeekFrom::Start(valid_len))
                .map_err(|e| StoreError::io(path, e))?;
            Some(Mutex::new(LogWriter {
                writer,
                offset: valid_len,
            }))
        };

        debug!(path = %path.display(), rows = state.len(), read_only, "opened log-file backend");
        Ok(Self {
            path: path.to_path_buf(),
            state,
            writer,
            sync_mode,
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the log in bytes.
    pub fn offset(&self) -> StoreResult<u64> {
        match &self.writer {
            Some(w) => Ok(w.lock().map_err(|_| StoreError::LockPoisoned)?.offset),
            None => fs::metadata(&self.path)
                .map(|m| m.len())
                .map_err(|e| StoreError::io(&self.path, e)),
        }
    }

    /// Rewrite the log so it holds exactly one record per live row, edge
    /// group, metadata entry and name group.
    pub fn compact(&self) -> StoreResult<()> {
        let Some(writer) = &self.writer else {
            return Err(StoreError::ReadOnly);
        };
        let mut w = writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        w.writer.flush().map_err(|e| StoreError::io(&self.path, e))?;
        let before = w.offset;

        let tmp_path = self.path.with_extension("compact");
        let tmp = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        let mut out = BufWriter::new(tmp);
        let mut written = 0u64;
        self.state.snapshot(|item| {
            let record = match item {
                SnapshotItem::Row(ty, row) => LogRecord::Put(ty, row.clone()),
                SnapshotItem::Edges(edges) => {
                    let Some(first) = edges.iter().next() else {
                        return Ok(());
                    };
                    let from = ObjectRef::new(first.referrer_type, first.referrer.clone());
                    LogRecord::ReplaceRefs(from, edges.iter().map(ReferenceEdge::target).collect())
                }
                SnapshotItem::Metadata(k, v) => LogRecord::Metadata(k.into(), v.into()),
                SnapshotItem::NameGroup(k, v) => LogRecord::NameGroup(k.into(), Some(v.into())),
            };
            written += write_record(&mut out, &record).map_err(|e| StoreError::io(&tmp_path, e))?;
            Ok(())
        })?;
        out.flush().map_err(|e| StoreError::io(&tmp_path, e))?;
        out.get_ref()
            .sync_all()
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(out);

        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        w.writer = BufWriter::new(file);
        w.offset = written;

        info!(path = %self.path.display(), before, after = written, "compacted log");
        Ok(())
    }

    fn append(&self, record: &LogRecord) -> StoreResult<()> {
        let Some(writer) = &self.writer else {
            return Err(StoreError::ReadOnly);
        };
        let mut w = writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        let n = write_record(&mut w.writer, record).map_err(|e| StoreError::io(&self.path, e))?;
        w.offset += n;
        Ok(())
    }

    fn sync(&self) -> StoreResult<()> {
        let Some(writer) = &self.writer else {
            return Ok(());
        };
        let mut w = writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        w.writer.flush().map_err(|e| StoreError::io(&self.path, e))?;
        if matches!(self.sync_mode, SyncMode::EveryCommit) {
            w.writer
                .get_ref()
                .sync_all()
                .map_err(|e| StoreError::io(&self.path, e))?;
        }
        Ok(())
    }

    fn writable(&self) -> StoreResult<()> {
        if self.writer.is_none() {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

/// Frame and write one record. Returns the number of bytes written.
fn write_record<W: Write>(out: &mut W, record: &LogRecord) -> io::Result<u64> {
    let payload = bincode::serialize(record)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    let length = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    out.write_all(&length.to_le_bytes())?;
    out.write_all(&crc.to_le_bytes())?;
    out.write_all(&payload)?;
    Ok(HEADER_SIZE as u64 + payload.len() as u64)
}

/// Replay every valid record into `state`. Returns the length of the valid prefix.
fn replay(path: &Path, state: &InMemoryBackend) -> StoreResult<u64> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let file_len = file.metadata().map_err(|e| StoreError::io(path, e))?.len();
    let mut reader = BufReader::new(file);
    let mut offset: u64 = 0;
    let mut applied = 0usize;

    while offset + HEADER_SIZE as u64 <= file_len {
        let mut header = [0u8; HEADER_SIZE];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(StoreError::io(path, e)),
        }
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
            warn!(offset, length, file_len, "invalid log record length; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "truncated log record; stopping replay");
                break;
            }
            Err(e) => return Err(StoreError::io(path, e)),
        }
        let next = offset + HEADER_SIZE as u64 + length as u64;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(offset, expected = expected_crc, actual = actual_crc, "CRC mismatch; skipping record");
            offset = next;
            continue;
        }

        match bincode::deserialize::<LogRecord>(&payload) {
            Ok(record) => {
                apply(state, record)?;
                applied += 1;
            }
            Err(e) => {
                warn!(offset, error = %e, "undecodable log record; skipping");
            }
        }
        offset = next;
    }

    debug!(path = %path.display(), applied, "log replay complete");
    Ok(offset)
}

fn apply(state: &InMemoryBackend, record: LogRecord) -> StoreResult<()> {
    match record {
        LogRecord::Put(ty, row) => state.put(ty, &row),
        LogRecord::Delete(ty, handle) => state.delete(ty, &handle).map(|_| ()),
        LogRecord::ReplaceRefs(from, targets) => {
            state.replace_references(&from, &targets.into_iter().collect())
        }
        LogRecord::DeleteRefsFrom(handle) => state.delete_references_from(&handle),
        LogRecord::ClearRefs => state.clear_references(),
        LogRecord::Metadata(k, v) => state.set_metadata(&k, &v),
        LogRecord::NameGroup(k, v) => state.set_name_group(&k, v.as_deref()),
    }
}

impl StorageBackend for LogFileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LogFile
    }

    fn is_read_only(&self) -> bool {
        self.writer.is_none()
    }

    fn get(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<Option<RawRow>> {
        self.state.get(object_type, handle)
    }

    fn put(&self, object_type: ObjectType, row: &RawRow) -> StoreResult<()> {
        self.writable()?;
        self.append(&LogRecord::Put(object_type, row.clone()))?;
        self.state.put(object_type, row)
    }

    fn delete(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<bool> {
        self.writable()?;
        if !self.state.contains(object_type, handle)? {
            return Ok(false);
        }
        self.append(&LogRecord::Delete(object_type, handle.clone()))?;
        self.state.delete(object_type, handle)
    }

    fn contains(&self, object_type: ObjectType, handle: &Handle) -> StoreResult<bool> {
        self.state.contains(object_type, handle)
    }

    fn handle_for_id(&self, object_type: ObjectType, id: &str) -> StoreResult<Option<Handle>> {
        self.state.handle_for_id(object_type, id)
    }

    fn count(&self, object_type: ObjectType) -> StoreResult<usize> {
        self.state.count(object_type)
    }

    fn handles(&self, object_type: ObjectType, sorted: bool) -> StoreResult<Vec<Handle>> {
        self.state.handles(object_type, sorted)
    }

    fn ids(&self, object_type: ObjectType) -> StoreResult<Vec<GrampsId>> {
        self.state.ids(object_type)
    }

    fn scan_page(
        &self,
        object_type: ObjectType,
        after: Option<&Handle>,
        limit: usize,
    ) -> StoreResult<Vec<RawRow>> {
        self.state.scan_page(object_type, after, limit)
    }

    fn replace_references(
        &self,
        referrer: &ObjectRef,
        targets: &BTreeSet<ObjectRef>,
    ) -> StoreResult<()> {
        self.writable()?;
        self.append(&LogRecord::ReplaceRefs(
            referrer.clone(),
            targets.iter().cloned().collect(),
        ))?;
        self.state.replace_references(referrer, targets)
    }

    fn delete_references_from(&self, referrer: &Handle) -> StoreResult<()> {
        self.writable()?;
        self.append(&LogRecord::DeleteRefsFrom(referrer.clone()))?;
        self.state.delete_references_from(referrer)
    }

    fn references_to(&self, handle: &Handle) -> StoreResult<Vec<ReferenceEdge>> {
        self.state.references_to(handle)
    }

    fn references_from(&self, handle: &Handle) -> StoreResult<Vec<ReferenceEdge>> {
        self.state.references_from(handle)
    }

    fn all_references(&self) -> StoreResult<Vec<ReferenceEdge>> {
        self.state.all_references()
    }

    fn clear_references(&self) -> StoreResult<()> {
        self.writable()?;
        self.append(&LogRecord::ClearRefs)?;
        self.state.clear_references()
    }

    fn get_metadata(&self, key: &str) -> StoreResult<Option<String>> {
        self.state.get_metadata(key)
    }

    fn set_metadata(&self, key: &str, value: &str) -> StoreResult<()> {
        self.writable()?;
        self.append(&LogRecord::Metadata(key.to_string(), value.to_string()))?;
        self.state.set_metadata(key, value)
    }

    fn metadata_keys(&self) -> StoreResult<Vec<String>> {
        self.state.metadata_keys()
    }

    fn get_name_group(&self, name: &str) -> StoreResult<Option<String>> {
        self.state.get_name_group(name)
    }

    fn set_name_group(&self, name: &str, group: Option<&str>) -> StoreResult<()> {
        self.writable()?;
        self.append(&LogRecord::NameGroup(
            name.to_string(),
            group.map(str::to_string),
        ))?;
        self.state.set_name_group(name, group)
    }

    fn name_group_keys(&self) -> StoreResult<Vec<String>> {
        self.state.name_group_keys()
    }

    fn begin(&self) -> StoreResult<()> {
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        self.sync()
    }

    fn abort(&self) -> StoreResult<bool> {
        self.sync()?;
        Ok(false)
    }

    fn close(&self) -> StoreResult<()> {
        self.sync()?;
        debug!(path = %self.path.display(), "closed log-file backend");
        Ok(())
    }
}

impl std::fmt::Debug for LogFileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFileBackend")
            .field("path", &self.path)
            .field("rows", &self.state.len())
            .finish()
    }
}
