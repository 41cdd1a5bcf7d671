//! Segmented write-ahead journal
//!
//! The journal is an append-only record store rooted at a directory of
//! size-bounded segment files. Records are appended with buffered (`Async`)
//! or fsynced (`Sync`) durability, individually tombstoned, and replayed in
//! append order via [`Journal::redo`].
//!
//! Guarantees:
//!
//! - Appends are framed and handed to the OS under the journal lock before
//!   the call returns, so `redo()` in the same process observes every
//!   completed append immediately, in call order, regardless of mode.
//! - A [`Location`] is stable for the life of the record: compaction rewrites
//!   segment files but preserves each surviving record's segment id and
//!   in-segment ordinal.
//! - Tombstones are themselves journal records, so deletions survive restart
//!   without in-place mutation of previously written bytes.
//!
//! The journal does not interpret payloads and does not reconstruct caller
//! state; callers that need their in-memory state back after a restart drive
//! their own replay over `redo()`.

use crate::error::{JournalError, JournalResult};
use crate::segment::{self, RawRecord, RecordKind, ScanItem, SEGMENT_HEADER_SIZE};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Durability mode for appends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Return once the record is handed to the OS; durable at the next sync
    Async,
    /// Block until the record is fsynced
    Sync,
}

/// Read mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Read what is currently visible
    Async,
    /// Flush all pending `Async` appends before reading
    Sync,
}

/// Durable handle to one appended record.
///
/// Ordering between locations written by the same journal reflects append
/// order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    segment: u64,
    index: u32,
}

impl Location {
    /// Segment the record lives in
    #[must_use]
    pub const fn segment(&self) -> u64 {
        self.segment
    }

    /// Ordinal of the record within its segment
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Location({}:{})", self.segment, self.index)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment, self.index)
    }
}

/// Physical position of one data record
struct RecordSlot {
    offset: u64,
    dead: bool,
}

/// In-memory index of one segment's data records
#[derive(Default)]
struct SegmentIndex {
    records: BTreeMap<u32, RecordSlot>,
}

/// The segment currently being appended to
struct ActiveSegment {
    id: u64,
    file: File,
    offset: u64,
    next_index: u32,
    index: SegmentIndex,
}

struct Inner {
    sealed: BTreeMap<u64, SegmentIndex>,
    active: ActiveSegment,
    tombstones: HashSet<Location>,
}

impl Inner {
    fn segment_index(&self, id: u64) -> Option<&SegmentIndex> {
        if id == self.active.id {
            Some(&self.active.index)
        } else {
            self.sealed.get(&id)
        }
    }

    fn slot(&self, location: Location) -> Option<&RecordSlot> {
        self.segment_index(location.segment)?
            .records
            .get(&location.index)
    }

    fn slot_mut(&mut self, location: Location) -> Option<&mut RecordSlot> {
        let index = if location.segment == self.active.id {
            &mut self.active.index
        } else {
            self.sealed.get_mut(&location.segment)?
        };
        index.records.get_mut(&location.index)
    }
}

/// Segmented write-ahead journal
pub struct Journal {
    dir: PathBuf,
    max_segment_size: u64,
    inner: Mutex<Inner>,
}

impl Journal {
    /// Open or create a journal rooted at `dir`.
    ///
    /// Existing segments are scanned to rebuild the journal's own record
    /// index and tombstone set. A torn record at the tail of the newest
    /// segment is truncated away; corruption anywhere else is an error.
    pub fn open(dir: impl AsRef<Path>, max_segment_size: u64) -> JournalResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".tmp") {
                warn!("removing stale compaction temp file {:?}", entry.path());
                let _ = fs::remove_file(entry.path());
                continue;
            }
            if let Some(id) = segment::parse_file_name(&name) {
                ids.push(id);
            }
        }
        ids.sort_unstable();

        let mut sealed = BTreeMap::new();
        let mut targets = Vec::new();
        let mut live = 0usize;

        let active = if let Some(&last) = ids.last() {
            let mut active = None;
            for &id in &ids {
                let scan = scan_segment(&dir, id, id == last)?;
                live += scan.index.records.len();
                targets.extend(scan.targets);
                if id == last {
                    let path = dir.join(segment::file_name(id));
                    let file = OpenOptions::new().read(true).write(true).open(&path)?;
                    if scan.truncated {
                        warn!(segment = id, offset = scan.end_offset, "truncating torn journal tail");
                        file.set_len(scan.end_offset)?;
                        file.sync_all()?;
                    }
                    active = Some(ActiveSegment {
                        id,
                        file,
                        offset: scan.end_offset,
                        next_index: scan.next_index,
                        index: scan.index,
                    });
                } else {
                    if scan.truncated {
                        return Err(segment::corrupt(id, scan.end_offset, "torn record in sealed segment"));
                    }
                    sealed.insert(id, scan.index);
                }
            }
            active.ok_or_else(|| segment::corrupt(last, 0, "missing newest segment"))?
        } else {
            let file = create_segment(&dir, 1)?;
            ActiveSegment {
                id: 1,
                file,
                offset: SEGMENT_HEADER_SIZE,
                next_index: 0,
                index: SegmentIndex::default(),
            }
        };

        let mut inner = Inner {
            sealed,
            active,
            tombstones: HashSet::new(),
        };

        // Apply tombstone markers to the rebuilt index. A marker whose target
        // was already compacted away is ignored.
        for (ts, ti) in targets {
            let location = Location { segment: ts, index: ti };
            if let Some(slot) = inner.slot_mut(location) {
                if !slot.dead {
                    slot.dead = true;
                    live -= 1;
                }
                inner.tombstones.insert(location);
            }
        }

        info!(
            dir = %dir.display(),
            segments = inner.sealed.len() + 1,
            live_records = live,
            tombstones = inner.tombstones.len(),
            "opened journal"
        );

        Ok(Self {
            dir,
            max_segment_size,
            inner: Mutex::new(inner),
        })
    }

    /// Directory this journal is rooted at
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append an opaque record, returning its durable location.
    ///
    /// `WriteMode::Sync` blocks until the record is fsynced;
    /// `WriteMode::Async` returns once the record is handed to the OS and is
    /// made durable by the next [`Journal::sync`], sync-mode append, or
    /// segment rollover.
    pub fn append(&self, payload: &[u8], mode: WriteMode) -> JournalResult<Location> {
        let mut inner = self.inner.lock();
        self.append_record(&mut inner, RecordKind::Data, payload, mode)
    }

    /// Mark the record at `location` as deleted.
    ///
    /// The record's bytes stay on disk until compaction; `redo()` stops
    /// yielding it immediately and reads of it fail. Deleting an already
    /// deleted location is a no-op.
    pub fn delete(&self, location: Location) -> JournalResult<()> {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.slot(location) else {
            return Err(JournalError::UnknownLocation {
                segment: location.segment,
                index: location.index,
            });
        };
        if slot.dead {
            return Ok(());
        }

        let payload = segment::encode_tombstone(location.segment, location.index);
        self.append_record(&mut inner, RecordKind::Tombstone, &payload, WriteMode::Async)?;

        if let Some(slot) = inner.slot_mut(location) {
            slot.dead = true;
        }
        inner.tombstones.insert(location);
        debug!(%location, "tombstoned journal record");
        Ok(())
    }

    /// Read the record at `location`.
    ///
    /// Fails with [`JournalError::RecordDeleted`] if the location has been
    /// tombstoned. `ReadMode::Sync` flushes pending appends first.
    pub fn read(&self, location: Location, mode: ReadMode) -> JournalResult<Vec<u8>> {
        if mode == ReadMode::Sync {
            self.sync()?;
        }
        let inner = self.inner.lock();
        let Some(slot) = inner.slot(location) else {
            return Err(JournalError::UnknownLocation {
                segment: location.segment,
                index: location.index,
            });
        };
        if slot.dead {
            return Err(JournalError::RecordDeleted {
                segment: location.segment,
                index: location.index,
            });
        }
        self.read_payload(location, slot.offset)
    }

    /// Block until every prior `Async` append is durable
    pub fn sync(&self) -> JournalResult<()> {
        let inner = self.inner.lock();
        inner.active.file.sync_data()?;
        Ok(())
    }

    /// Replay all live records in append order.
    ///
    /// The iterator snapshots the set of live records at call time and then
    /// resolves each one lazily; records tombstoned while the iteration is in
    /// flight are skipped, never yielded. A fresh call always starts from the
    /// beginning of the log.
    pub fn redo(&self) -> Redo<'_> {
        let inner = self.inner.lock();
        let mut pending = Vec::new();
        for (&id, seg) in &inner.sealed {
            for (&index, slot) in &seg.records {
                if !slot.dead {
                    pending.push(Location { segment: id, index });
                }
            }
        }
        for (&index, slot) in &inner.active.index.records {
            if !slot.dead {
                pending.push(Location {
                    segment: inner.active.id,
                    index,
                });
            }
        }
        Redo {
            journal: self,
            pending: pending.into_iter(),
        }
    }

    /// Number of live (non-tombstoned) records
    #[must_use]
    pub fn live_records(&self) -> usize {
        let inner = self.inner.lock();
        let sealed: usize = inner
            .sealed
            .values()
            .map(|s| s.records.values().filter(|r| !r.dead).count())
            .sum();
        sealed
            + inner
                .active
                .index
                .records
                .values()
                .filter(|r| !r.dead)
                .count()
    }

    /// Number of segment files currently on disk
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.inner.lock().sealed.len() + 1
    }

    /// Rewrite sealed segments, physically dropping tombstoned records.
    ///
    /// Each segment is handled in its own bounded critical section; the
    /// active segment is never touched. Locations of surviving records are
    /// preserved.
    pub fn compact(&self) -> JournalResult<()> {
        let sealed_ids: Vec<u64> = self.inner.lock().sealed.keys().copied().collect();

        let mut removed = 0usize;
        let mut rewritten = 0usize;
        for id in sealed_ids {
            let mut inner = self.inner.lock();
            if !inner.sealed.contains_key(&id) {
                continue;
            }
            match self.compact_segment(&mut inner, id)? {
                CompactOutcome::Kept => {}
                CompactOutcome::Removed => removed += 1,
                CompactOutcome::Rewritten => rewritten += 1,
            }
        }

        if removed > 0 || rewritten > 0 {
            info!(removed, rewritten, "compacted journal segments");
        }
        Ok(())
    }

    fn append_record(
        &self,
        inner: &mut Inner,
        kind: RecordKind,
        payload: &[u8],
        mode: WriteMode,
    ) -> JournalResult<Location> {
        let framed =
            (segment::RECORD_HEADER_SIZE + payload.len() + segment::RECORD_TRAILER_SIZE) as u64;
        if inner.active.offset > SEGMENT_HEADER_SIZE
            && inner.active.offset + framed > self.max_segment_size
        {
            self.roll_segment(inner)?;
        }

        let index = inner.active.next_index;
        let offset = inner.active.offset;
        let bytes = segment::encode_record(kind, index, payload);

        inner.active.file.seek(SeekFrom::Start(offset))?;
        inner.active.file.write_all(&bytes)?;
        if mode == WriteMode::Sync {
            inner.active.file.sync_data()?;
        }

        inner.active.offset = offset + bytes.len() as u64;
        inner.active.next_index = index + 1;

        let location = Location {
            segment: inner.active.id,
            index,
        };
        if kind == RecordKind::Data {
            inner
                .active
                .index
                .records
                .insert(index, RecordSlot { offset, dead: false });
        }
        Ok(location)
    }

    fn roll_segment(&self, inner: &mut Inner) -> JournalResult<()> {
        inner.active.file.sync_all()?;

        let next_id = inner.active.id + 1;
        let file = create_segment(&self.dir, next_id)?;
        let prev = std::mem::replace(
            &mut inner.active,
            ActiveSegment {
                id: next_id,
                file,
                offset: SEGMENT_HEADER_SIZE,
                next_index: 0,
                index: SegmentIndex::default(),
            },
        );
        inner.sealed.insert(prev.id, prev.index);
        debug!(segment = next_id, "rolled journal segment");
        Ok(())
    }

    fn read_payload(&self, location: Location, offset: u64) -> JournalResult<Vec<u8>> {
        let path = self.dir.join(segment::file_name(location.segment));
        let mut reader = BufReader::new(File::open(path)?);
        reader.seek(SeekFrom::Start(offset))?;
        match segment::read_record(&mut reader)? {
            ScanItem::Record(rec) if rec.kind == RecordKind::Data && rec.index == location.index => {
                Ok(rec.payload)
            }
            ScanItem::Record(rec) => Err(segment::corrupt(
                location.segment,
                offset,
                format!("expected data record {}, found {:?} {}", location.index, rec.kind, rec.index),
            )),
            ScanItem::Eof | ScanItem::Invalid(_) => Err(segment::corrupt(
                location.segment,
                offset,
                "record unreadable at indexed offset",
            )),
        }
    }

    fn compact_segment(&self, inner: &mut Inner, id: u64) -> JournalResult<CompactOutcome> {
        let path = self.dir.join(segment::file_name(id));

        let mut reader = BufReader::new(File::open(&path)?);
        segment::read_header(&mut reader, id)?;

        let mut kept: Vec<RawRecord> = Vec::new();
        let mut purged: Vec<Location> = Vec::new();
        let mut dropped = 0usize;
        let mut offset = SEGMENT_HEADER_SIZE;
        loop {
            match segment::read_record(&mut reader)? {
                ScanItem::Record(rec) => {
                    offset += rec.framed_len();
                    let keep = match rec.kind {
                        RecordKind::Data => {
                            let location = Location { segment: id, index: rec.index };
                            let live = inner.slot(location).is_some_and(|s| !s.dead);
                            if !live {
                                purged.push(location);
                            }
                            live
                        }
                        // A marker earns its keep only while its target's
                        // bytes are still physically present somewhere.
                        RecordKind::Tombstone => segment::decode_tombstone(&rec.payload)
                            .is_some_and(|(ts, ti)| {
                                inner.slot(Location { segment: ts, index: ti }).is_some()
                            }),
                    };
                    if keep {
                        kept.push(rec);
                    } else {
                        dropped += 1;
                    }
                }
                ScanItem::Eof => break,
                ScanItem::Invalid(reason) => return Err(segment::corrupt(id, offset, reason)),
            }
        }

        if dropped == 0 {
            return Ok(CompactOutcome::Kept);
        }

        if kept.is_empty() {
            fs::remove_file(&path)?;
            inner.sealed.remove(&id);
            inner.tombstones.retain(|l| l.segment != id);
            debug!(segment = id, "removed fully dead segment");
            return Ok(CompactOutcome::Removed);
        }

        let tmp = path.with_extension("wal.tmp");
        let mut out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        segment::write_header(&mut out, id)?;

        let mut records = BTreeMap::new();
        let mut out_offset = SEGMENT_HEADER_SIZE;
        for rec in &kept {
            let bytes = segment::encode_record(rec.kind, rec.index, &rec.payload);
            out.write_all(&bytes)?;
            if rec.kind == RecordKind::Data {
                records.insert(rec.index, RecordSlot { offset: out_offset, dead: false });
            }
            out_offset += bytes.len() as u64;
        }
        out.sync_all()?;
        fs::rename(&tmp, &path)?;

        inner.sealed.insert(id, SegmentIndex { records });
        for location in purged {
            inner.tombstones.remove(&location);
        }
        debug!(segment = id, dropped, kept = kept.len(), "rewrote segment");
        Ok(CompactOutcome::Rewritten)
    }
}

enum CompactOutcome {
    Kept,
    Removed,
    Rewritten,
}

/// Lazy replay of live records, in append order
pub struct Redo<'a> {
    journal: &'a Journal,
    pending: std::vec::IntoIter<Location>,
}

impl Iterator for Redo<'_> {
    type Item = JournalResult<(Location, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let location = self.pending.next()?;
            let inner = self.journal.inner.lock();
            let Some(slot) = inner.slot(location) else {
                continue;
            };
            if slot.dead {
                continue;
            }
            let offset = slot.offset;
            return Some(
                self.journal
                    .read_payload(location, offset)
                    .map(|payload| (location, payload)),
            );
        }
    }
}

fn create_segment(dir: &Path, id: u64) -> JournalResult<File> {
    let path = dir.join(segment::file_name(id));
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(&path)?;
    segment::write_header(&mut file, id)?;
    file.sync_all()?;
    Ok(file)
}

struct SegmentScan {
    index: SegmentIndex,
    targets: Vec<(u64, u32)>,
    end_offset: u64,
    next_index: u32,
    truncated: bool,
}

fn scan_segment(dir: &Path, id: u64, tolerate_tail: bool) -> JournalResult<SegmentScan> {
    let path = dir.join(segment::file_name(id));
    let mut reader = BufReader::new(File::open(&path)?);
    segment::read_header(&mut reader, id)?;

    let mut scan = SegmentScan {
        index: SegmentIndex::default(),
        targets: Vec::new(),
        end_offset: SEGMENT_HEADER_SIZE,
        next_index: 0,
        truncated: false,
    };

    loop {
        match segment::read_record(&mut reader)? {
            ScanItem::Record(rec) => {
                let framed = rec.framed_len();
                match rec.kind {
                    RecordKind::Data => {
                        scan.index.records.insert(
                            rec.index,
                            RecordSlot { offset: scan.end_offset, dead: false },
                        );
                    }
                    RecordKind::Tombstone => match segment::decode_tombstone(&rec.payload) {
                        Some(target) => scan.targets.push(target),
                        None => {
                            if tolerate_tail {
                                scan.truncated = true;
                                break;
                            }
                            return Err(segment::corrupt(id, scan.end_offset, "bad tombstone payload"));
                        }
                    },
                }
                scan.next_index = scan.next_index.max(rec.index + 1);
                scan.end_offset += framed;
            }
            ScanItem::Eof => break,
            ScanItem::Invalid(reason) => {
                if tolerate_tail {
                    scan.truncated = true;
                    break;
                }
                return Err(segment::corrupt(id, scan.end_offset, reason));
            }
        }
    }

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn payloads(journal: &Journal) -> Vec<Vec<u8>> {
        journal
            .redo()
            .map(|item| item.unwrap().1)
            .collect()
    }

    #[test]
    fn test_append_read_roundtrip() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 8192).unwrap();

        let loc = journal.append(b"hello journal", WriteMode::Async).unwrap();
        assert_eq!(journal.read(loc, ReadMode::Async).unwrap(), b"hello journal");
        assert_eq!(journal.read(loc, ReadMode::Sync).unwrap(), b"hello journal");
    }

    #[test]
    fn test_redo_yields_appends_in_order() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 8192).unwrap();

        for i in 0u32..20 {
            journal.append(&i.to_le_bytes(), WriteMode::Async).unwrap();
        }

        let seen: Vec<u32> = journal
            .redo()
            .map(|item| u32::from_le_bytes(item.unwrap().1.try_into().unwrap()))
            .collect();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_deleted_record_is_not_replayed() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 8192).unwrap();

        let mut locations = Vec::new();
        for i in 0u32..10 {
            locations.push(journal.append(&i.to_le_bytes(), WriteMode::Async).unwrap());
        }
        journal.delete(locations[6]).unwrap();

        let seen: Vec<u32> = journal
            .redo()
            .map(|item| u32::from_le_bytes(item.unwrap().1.try_into().unwrap()))
            .collect();
        assert_eq!(seen.len(), 9);
        assert!(!seen.contains(&6));
    }

    #[test]
    fn test_read_after_delete_fails() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 8192).unwrap();

        let loc = journal.append(b"doomed", WriteMode::Async).unwrap();
        journal.delete(loc).unwrap();

        assert!(matches!(
            journal.read(loc, ReadMode::Async),
            Err(JournalError::RecordDeleted { .. })
        ));
        // double delete is a no-op
        journal.delete(loc).unwrap();
    }

    #[test]
    fn test_unknown_location_errors() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 8192).unwrap();
        journal.append(b"only", WriteMode::Async).unwrap();

        let bogus = Location { segment: 99, index: 0 };
        assert!(matches!(
            journal.read(bogus, ReadMode::Async),
            Err(JournalError::UnknownLocation { .. })
        ));
        assert!(matches!(
            journal.delete(bogus),
            Err(JournalError::UnknownLocation { .. })
        ));
    }

    #[test]
    fn test_locations_order_by_append() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 64).unwrap();

        let mut prev = None;
        for i in 0u32..50 {
            let loc = journal.append(&i.to_le_bytes(), WriteMode::Async).unwrap();
            if let Some(p) = prev {
                assert!(loc > p);
            }
            prev = Some(loc);
        }
    }

    #[test]
    fn test_interleaved_appends_under_shared_lock_stay_ordered() {
        let dir = tempdir().unwrap();
        let journal = Arc::new(Journal::open(dir.path(), 8192).unwrap());
        let next = Arc::new(Mutex::new(1u32));

        let mut handles = Vec::new();
        for parity in 0..2u32 {
            let journal = Arc::clone(&journal);
            let next = Arc::clone(&next);
            handles.push(thread::spawn(move || {
                loop {
                    let mut n = next.lock();
                    if *n > 10 {
                        break;
                    }
                    if *n % 2 == parity {
                        journal.append(&n.to_le_bytes(), WriteMode::Async).unwrap();
                        *n += 1;
                    }
                    drop(n);
                    thread::yield_now();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        journal.sync().unwrap();

        let seen: Vec<u32> = journal
            .redo()
            .map(|item| u32::from_le_bytes(item.unwrap().1.try_into().unwrap()))
            .collect();
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_varied_payload_sizes_roundtrip() {
        use rand::Rng;
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 512).unwrap();

        let mut expected = Vec::new();
        for _ in 0..40 {
            let len = rng.gen_range(0..200);
            let payload: Vec<u8> = (0..len).map(|_| rng.gen_range(0..=255u8)).collect();
            journal.append(&payload, WriteMode::Async).unwrap();
            expected.push(payload);
        }

        let seen: Vec<Vec<u8>> = journal.redo().map(|item| item.unwrap().1).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_segment_rollover_and_ordered_traversal() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 128).unwrap();

        for i in 0u32..40 {
            journal.append(&i.to_le_bytes(), WriteMode::Async).unwrap();
        }
        assert!(journal.segment_count() > 1);

        let seen: Vec<u32> = journal
            .redo()
            .map(|item| u32::from_le_bytes(item.unwrap().1.try_into().unwrap()))
            .collect();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_reopen_preserves_records_and_tombstones() {
        let dir = tempdir().unwrap();

        let kept;
        {
            let journal = Journal::open(dir.path(), 128).unwrap();
            let mut locations = Vec::new();
            for i in 0u32..12 {
                locations.push(journal.append(&i.to_le_bytes(), WriteMode::Async).unwrap());
            }
            journal.delete(locations[0]).unwrap();
            journal.delete(locations[7]).unwrap();
            journal.sync().unwrap();
            kept = locations[3];
        }

        let journal = Journal::open(dir.path(), 128).unwrap();
        assert_eq!(journal.live_records(), 10);
        assert_eq!(journal.read(kept, ReadMode::Async).unwrap(), 3u32.to_le_bytes());

        let seen: Vec<u32> = journal
            .redo()
            .map(|item| u32::from_le_bytes(item.unwrap().1.try_into().unwrap()))
            .collect();
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 8, 9, 10, 11]);
    }

    #[test]
    fn test_torn_tail_is_truncated_on_open() {
        let dir = tempdir().unwrap();

        {
            let journal = Journal::open(dir.path(), 8192).unwrap();
            for i in 0u32..3 {
                journal.append(&i.to_le_bytes(), WriteMode::Async).unwrap();
            }
            journal.sync().unwrap();
        }

        // chop a few bytes off the last record
        let path = dir.path().join(segment::file_name(1));
        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();

        let journal = Journal::open(dir.path(), 8192).unwrap();
        assert_eq!(payloads(&journal).len(), 2);

        // the journal keeps appending where the good data ends
        let loc = journal.append(&9u32.to_le_bytes(), WriteMode::Sync).unwrap();
        assert_eq!(journal.read(loc, ReadMode::Async).unwrap(), 9u32.to_le_bytes());
        assert_eq!(payloads(&journal).len(), 3);
    }

    #[test]
    fn test_compaction_removes_fully_dead_segments() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 96).unwrap();

        let mut locations = Vec::new();
        for i in 0u32..30 {
            locations.push(journal.append(&i.to_le_bytes(), WriteMode::Async).unwrap());
        }
        let before = journal.segment_count();
        assert!(before > 2);

        // kill everything in the first two segments
        let first_two: Vec<Location> = locations
            .iter()
            .copied()
            .filter(|l| l.segment() <= 2)
            .collect();
        assert!(!first_two.is_empty());
        for loc in &first_two {
            journal.delete(*loc).unwrap();
        }

        journal.compact().unwrap();
        assert!(journal.segment_count() < before);

        let expected = 30 - first_two.len();
        assert_eq!(journal.live_records(), expected);
        assert_eq!(payloads(&journal).len(), expected);
    }

    #[test]
    fn test_compaction_keeps_locations_valid() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 96).unwrap();

        let mut locations = Vec::new();
        for i in 0u32..30 {
            locations.push(journal.append(&i.to_le_bytes(), WriteMode::Async).unwrap());
        }
        // delete every other record so sealed segments get rewritten
        for loc in locations.iter().step_by(2) {
            journal.delete(*loc).unwrap();
        }
        journal.compact().unwrap();

        for (i, loc) in locations.iter().enumerate() {
            if i % 2 == 0 {
                assert!(journal.read(*loc, ReadMode::Async).is_err());
            } else {
                // surviving records stay readable at their original location
                assert_eq!(
                    journal.read(*loc, ReadMode::Async).unwrap(),
                    (i as u32).to_le_bytes()
                );
            }
        }
    }

    #[test]
    fn test_compacted_journal_reopens_cleanly() {
        let dir = tempdir().unwrap();

        {
            let journal = Journal::open(dir.path(), 96).unwrap();
            let mut locations = Vec::new();
            for i in 0u32..30 {
                locations.push(journal.append(&i.to_le_bytes(), WriteMode::Async).unwrap());
            }
            for loc in locations.iter().step_by(3) {
                journal.delete(*loc).unwrap();
            }
            journal.compact().unwrap();
            journal.sync().unwrap();
        }

        let journal = Journal::open(dir.path(), 96).unwrap();
        let seen: Vec<u32> = journal
            .redo()
            .map(|item| u32::from_le_bytes(item.unwrap().1.try_into().unwrap()))
            .collect();
        let expected: Vec<u32> = (0..30).filter(|i| i % 3 != 0).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_redo_skips_records_deleted_mid_iteration() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path(), 8192).unwrap();

        let mut locations = Vec::new();
        for i in 0u32..5 {
            locations.push(journal.append(&i.to_le_bytes(), WriteMode::Async).unwrap());
        }

        let mut redo = journal.redo();
        let first = redo.next().unwrap().unwrap();
        assert_eq!(first.1, 0u32.to_le_bytes());

        // delete a record the iterator has not reached yet
        journal.delete(locations[2]).unwrap();

        let rest: Vec<u32> = redo
            .map(|item| u32::from_le_bytes(item.unwrap().1.try_into().unwrap()))
            .collect();
        assert_eq!(rest, vec![1, 3, 4]);
    }
}
