use crate::error::{Result, StoreError};
use crate::hasher::HeaderHasher;
use crate::keys::{block_key, file_key, file_key_prefix, file_no_from_key, last_file_key, version_key};
use crate::layout::{file_path, mhdr_size, read_u32_le, write_header, OBJECT_MAGIC};
use crate::options::StoreOptions;
use crate::records::{BlockRecord, FileRecord};
use hsk_core::constants::DEFAULT_MAX_FILE_LENGTH;
use hsk_core::{BlockType, Hash};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SCHEMA_VERSION: u32 = 1;

/// The append-only, hash-addressed object store (spec §4.1). One instance
/// owns all three type spaces (BLOCK/UNDO/MERKLE); each has its own file
/// numbering and "last file" pointer but they share the index database.
pub struct BlockStore {
    dir: PathBuf,
    max_file_length: u32,
    db: rocksdb::DB,
    writing: [AtomicBool; 3],
    last_file_cache: Mutex<[Option<u32>; 3]>,
    hasher: Arc<dyn HeaderHasher>,
}

struct WriteGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> Drop for WriteGuard<'a> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

fn type_index(ty: BlockType) -> usize {
    match ty {
        BlockType::Block => 0,
        BlockType::Undo => 1,
        BlockType::Merkle => 2,
    }
}

impl BlockStore {
    /// Opens (creating if absent) the store at `options.dir`, running
    /// best-effort recovery for any type whose on-disk files outrun the
    /// index (spec §4.1 "Recovery").
    pub fn open(options: StoreOptions, hasher: Arc<dyn HeaderHasher>) -> Result<BlockStore> {
        fs::create_dir_all(&options.dir)?;
        let index_dir = options.dir.join("index");
        let mut rocks_opts = rocksdb::Options::default();
        rocks_opts.create_if_missing(true);
        let db = rocksdb::DB::open(&rocks_opts, &index_dir)
            .map_err(|e| StoreError::Index(e.to_string()))?;

        let store = BlockStore {
            dir: options.dir,
            max_file_length: if options.max_file_length == 0 {
                DEFAULT_MAX_FILE_LENGTH
            } else {
                options.max_file_length
            },
            db,
            writing: [AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false)],
            last_file_cache: Mutex::new([None, None, None]),
            hasher,
        };

        store.db.put(version_key(), SCHEMA_VERSION.to_le_bytes())
            .map_err(|e| StoreError::Index(e.to_string()))?;

        for &ty in BlockType::ALL.iter() {
            store.recover_if_needed(ty)?;
        }
        Ok(store)
    }

    fn acquire_write_guard(&self, ty: BlockType) -> Result<WriteGuard<'_>> {
        let flag = &self.writing[type_index(ty)];
        if flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(StoreError::AlreadyWriting);
        }
        Ok(WriteGuard { flag })
    }

    fn get_block_record(&self, ty: BlockType, hash: &Hash) -> Result<Option<BlockRecord>> {
        let raw = self.db.get(block_key(ty, hash)).map_err(|e| StoreError::Index(e.to_string()))?;
        Ok(raw.and_then(|v| BlockRecord::decode(&v)))
    }

    fn get_file_record(&self, ty: BlockType, file_no: u32) -> Result<Option<FileRecord>> {
        let raw = self.db.get(file_key(ty, file_no)).map_err(|e| StoreError::Index(e.to_string()))?;
        Ok(raw.and_then(|v| FileRecord::decode(&v)))
    }

    fn get_last_file(&self, ty: BlockType) -> Result<Option<u32>> {
        {
            let cache = self.last_file_cache.lock();
            if let Some(n) = cache[type_index(ty)] {
                return Ok(Some(n));
            }
        }
        let raw = self.db.get(last_file_key(ty)).map_err(|e| StoreError::Index(e.to_string()))?;
        let n = raw.map(|v| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&v[0..4]);
            u32::from_le_bytes(buf)
        });
        if let Some(n) = n {
            self.last_file_cache.lock()[type_index(ty)] = Some(n);
        }
        Ok(n)
    }

    fn set_last_file_cache(&self, ty: BlockType, file_no: u32) {
        self.last_file_cache.lock()[type_index(ty)] = Some(file_no);
    }

    /// Writes a new object of `ty`, keyed by `hash`. Fails with
    /// `AlreadyExists` if already indexed, `AlreadyWriting` if another write
    /// of this type is in flight, `TooLarge` if it can never fit a fresh
    /// file.
    pub fn write_block(&self, ty: BlockType, hash: Hash, data: &[u8]) -> Result<BlockRecord> {
        let _guard = self.acquire_write_guard(ty)?;
        if self.get_block_record(ty, &hash)?.is_some() {
            return Err(StoreError::AlreadyExists);
        }

        let mhdr = mhdr_size(ty);
        let n = data.len() as u32;
        let total = mhdr + n;
        if total > self.max_file_length {
            return Err(StoreError::TooLarge(data.len()));
        }

        let mut file_no = self.get_last_file(ty)?.unwrap_or(0);
        let mut file_record = self.get_file_record(ty, file_no)?.unwrap_or(FileRecord {
            blocks: 0,
            used: 0,
            length: self.max_file_length,
        });

        if file_record.used + total > file_record.length {
            file_no += 1;
            file_record = FileRecord { blocks: 0, used: 0, length: self.max_file_length };
        }

        let path = file_path(&self.dir, ty, file_no);
        let mut buf = Vec::with_capacity(total as usize);
        write_header(&mut buf, n);
        if ty == BlockType::Undo {
            buf.extend_from_slice(hash.as_bytes());
        }
        buf.extend_from_slice(data);

        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        f.write_all(&buf)?;

        let position = file_record.used + mhdr;
        let record = BlockRecord { file_number: file_no, position, length: n };
        file_record.blocks += 1;
        file_record.used += total;

        let mut batch = rocksdb::WriteBatch::default();
        batch.put(block_key(ty, &hash), record.encode());
        batch.put(file_key(ty, file_no), file_record.encode());
        batch.put(last_file_key(ty), file_no.to_le_bytes());
        self.db.write(batch).map_err(|e| StoreError::Index(e.to_string()))?;
        self.set_last_file_cache(ty, file_no);

        Ok(record)
    }

    /// Reads `length` bytes starting at `offset` within the object's
    /// payload; `offset == 0 && length == 0` reads the whole object.
    pub fn read_block(&self, ty: BlockType, hash: &Hash, offset: u32, length: u32) -> Result<Vec<u8>> {
        let record = self.get_block_record(ty, hash)?.ok_or(StoreError::NotFound)?;
        let len = if offset == 0 && length == 0 { record.length } else { length };
        if offset.saturating_add(len) > record.length {
            return Err(StoreError::OutOfBounds);
        }
        let path = file_path(&self.dir, ty, record.file_number);
        let mut f = File::open(path)?;
        f.seek(SeekFrom::Start((record.position + offset) as u64))?;
        let mut buf = vec![0u8; len as usize];
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Returns `true` if `hash` is indexed for `ty` without touching disk.
    pub fn has_block(&self, ty: BlockType, hash: &Hash) -> Result<bool> {
        Ok(self.get_block_record(ty, hash)?.is_some())
    }

    /// Decrements the owning file's live-block count; unlinks the file and
    /// drops its index record once it reaches zero. Returns `false` if
    /// `hash` was not indexed.
    pub fn prune_block(&self, ty: BlockType, hash: &Hash) -> Result<bool> {
        let record = match self.get_block_record(ty, hash)? {
            Some(r) => r,
            None => return Ok(false),
        };
        let mut file_record = self.get_file_record(ty, record.file_number)?.unwrap_or_default();

        let mut batch = rocksdb::WriteBatch::default();
        batch.delete(block_key(ty, hash));

        let unlink = file_record.blocks <= 1;
        if unlink {
            batch.delete(file_key(ty, record.file_number));
        } else {
            file_record.blocks -= 1;
            batch.put(file_key(ty, record.file_number), file_record.encode());
        }
        self.db.write(batch).map_err(|e| StoreError::Index(e.to_string()))?;

        if unlink {
            let path = file_path(&self.dir, ty, record.file_number);
            let _ = fs::remove_file(path);
        }

        Ok(true)
    }

    pub fn batch(&self) -> crate::batch::WriteBatch<'_> {
        crate::batch::WriteBatch::new(self)
    }

    fn observed_file_numbers(&self, ty: BlockType) -> Result<Vec<u32>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let prefix = ty.file_prefix();
            if let Some(rest) = name.strip_prefix(prefix) {
                if let Some(digits) = rest.strip_suffix(".dat") {
                    if digits.len() == 5 {
                        if let Ok(n) = digits.parse::<u32>() {
                            out.push(n);
                        }
                    }
                }
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    fn recover_if_needed(&self, ty: BlockType) -> Result<()> {
        let observed = self.observed_file_numbers(ty)?;
        if observed.is_empty() {
            return Ok(());
        }
        let needs_rescan = observed.iter().any(|&n| {
            self.get_file_record(ty, n).ok().flatten().is_none()
        });
        if !needs_rescan {
            return Ok(());
        }
        log::warn!(target: "store", "index missing file records for type {:?}, re-scanning {} files", ty, observed.len());
        self.rescan_type(ty, &observed)
    }

    /// Scans every on-disk file for `ty` and rebuilds its index entries
    /// from scratch (spec §4.1 "Recovery"). Best-effort: a magic mismatch
    /// advances one byte and retries; a trailing partial object is dropped.
    fn rescan_type(&self, ty: BlockType, files: &[u32]) -> Result<()> {
        // Clear any stale entries for this type before rebuilding.
        let mut clear_batch = rocksdb::WriteBatch::default();
        let iter = self.db.prefix_iterator(file_key_prefix(ty));
        for item in iter {
            let (k, _) = item.map_err(|e| StoreError::Index(e.to_string()))?;
            if file_no_from_key(&k).is_some() {
                clear_batch.delete(k);
            } else {
                break;
            }
        }
        self.db.write(clear_batch).map_err(|e| StoreError::Index(e.to_string()))?;

        let mut highest_with_blocks = None;
        for &file_no in files {
            let path = file_path(&self.dir, ty, file_no);
            let data = fs::read(&path)?;
            let mut offset = 0usize;
            let mut blocks = 0u32;
            let mhdr = mhdr_size(ty) as usize;
            let mut batch = rocksdb::WriteBatch::default();
            while offset < data.len() {
                if data.len() - offset < mhdr {
                    log::debug!(target: "store", "dropping trailing partial object in {:?}", path);
                    break;
                }
                let magic = read_u32_le(&data[offset..]);
                if magic != Some(OBJECT_MAGIC) {
                    offset += 1;
                    continue;
                }
                let length = match read_u32_le(&data[offset + 4..]) {
                    Some(l) => l as usize,
                    None => break,
                };
                let total = mhdr + length;
                if offset + total > data.len() {
                    log::debug!(target: "store", "dropping trailing partial object in {:?}", path);
                    break;
                }
                let payload_start = offset + mhdr;
                let payload = &data[payload_start..payload_start + length];
                let hash = if ty == BlockType::Undo {
                    Hash::from_slice(&data[offset + 8..offset + 40]).unwrap_or(Hash::ZERO)
                } else if payload.len() >= 80 {
                    self.hasher.hash_header(&payload[0..80])
                } else {
                    Hash::ZERO
                };

                let record = BlockRecord {
                    file_number: file_no,
                    position: payload_start as u32,
                    length: length as u32,
                };
                batch.put(block_key(ty, &hash), record.encode());
                blocks += 1;
                offset += total;
            }

            if blocks > 0 {
                let file_record = FileRecord {
                    blocks,
                    used: offset as u32,
                    length: self.max_file_length.max(offset as u32),
                };
                batch.put(file_key(ty, file_no), file_record.encode());
                highest_with_blocks = Some(file_no);
            }
            self.db.write(batch).map_err(|e| StoreError::Index(e.to_string()))?;
        }

        if let Some(last) = highest_with_blocks.or_else(|| files.last().copied()) {
            self.db.put(last_file_key(ty), last.to_le_bytes())
                .map_err(|e| StoreError::Index(e.to_string()))?;
            self.set_last_file_cache(ty, last);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Sha256HeaderHasher;

    fn open_store() -> (tempfile::TempDir, BlockStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(StoreOptions::new(dir.path()), Arc::new(Sha256HeaderHasher)).unwrap();
        (dir, store)
    }

    fn fake_header(tag: u8) -> Vec<u8> {
        let mut h = vec![tag; 80];
        h[0] = tag;
        h
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, store) = open_store();
        let payload = fake_header(1);
        let hash = Hash::digest(&payload[0..80]);
        let record = store.write_block(BlockType::Block, hash, &payload).unwrap();
        assert_eq!(record.length, payload.len() as u32);

        let read = store.read_block(BlockType::Block, &hash, 0, 0).unwrap();
        assert_eq!(read, payload);
        assert!(store.has_block(BlockType::Block, &hash).unwrap());
    }

    #[test]
    fn duplicate_write_fails() {
        let (_dir, store) = open_store();
        let payload = fake_header(2);
        let hash = Hash::digest(&payload[0..80]);
        store.write_block(BlockType::Block, hash, &payload).unwrap();
        let err = store.write_block(BlockType::Block, hash, &payload).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists));
    }

    #[test]
    fn out_of_bounds_read_fails() {
        let (_dir, store) = open_store();
        let payload = fake_header(3);
        let hash = Hash::digest(&payload[0..80]);
        store.write_block(BlockType::Block, hash, &payload).unwrap();
        let err = store.read_block(BlockType::Block, &hash, 0, payload.len() as u32 + 1).unwrap_err();
        assert!(matches!(err, StoreError::OutOfBounds));
    }

    #[test]
    fn prune_collapses_file_and_unlinks() {
        let (_dir, store) = open_store();
        let p1 = fake_header(4);
        let p2 = fake_header(5);
        let h1 = Hash::digest(&p1[0..80]);
        let h2 = Hash::digest(&p2[0..80]);
        let r1 = store.write_block(BlockType::Block, h1, &p1).unwrap();
        store.write_block(BlockType::Block, h2, &p2).unwrap();

        assert!(store.prune_block(BlockType::Block, &h1).unwrap());
        let file_record = store.get_file_record(BlockType::Block, r1.file_number).unwrap().unwrap();
        assert_eq!(file_record.blocks, 1);

        let path = file_path(&store.dir, BlockType::Block, r1.file_number);
        assert!(path.exists());

        assert!(store.prune_block(BlockType::Block, &h2).unwrap());
        assert!(!path.exists());
        assert!(store.get_file_record(BlockType::Block, r1.file_number).unwrap().is_none());
        assert!(!store.has_block(BlockType::Block, &h1).unwrap());
    }

    #[test]
    fn prune_unknown_hash_returns_false() {
        let (_dir, store) = open_store();
        assert!(!store.prune_block(BlockType::Block, &Hash::ZERO).unwrap());
    }

    #[test]
    fn cold_open_reindexes_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = BlockStore::open(StoreOptions::new(dir.path()), Arc::new(Sha256HeaderHasher)).unwrap();
            let p1 = fake_header(6);
            let p2 = fake_header(7);
            let h1 = Hash::digest(&p1[0..80]);
            let h2 = Hash::digest(&p2[0..80]);
            store.write_block(BlockType::Block, h1, &p1).unwrap();
            store.write_block(BlockType::Block, h2, &p2).unwrap();
            drop(store);
        }
        // Simulate a lost index: drop the rocksdb directory, keep the data files.
        fs::remove_dir_all(dir.path().join("index")).unwrap();

        let store = BlockStore::open(StoreOptions::new(dir.path()), Arc::new(Sha256HeaderHasher)).unwrap();
        let file_record = store.get_file_record(BlockType::Block, 0).unwrap().unwrap();
        assert_eq!(file_record.blocks, 2);
        assert_eq!(store.get_last_file(BlockType::Block).unwrap(), Some(0));
    }

    #[test]
    fn object_too_large_for_a_fresh_file_fails_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = StoreOptions::new(dir.path());
        opts.max_file_length = 100;
        let store = BlockStore::open(opts, Arc::new(Sha256HeaderHasher)).unwrap();
        let payload = vec![0u8; 200];
        let hash = Hash::digest(&payload);
        let err = store.write_block(BlockType::Block, hash, &payload).unwrap_err();
        assert!(matches!(err, StoreError::TooLarge(_)));
    }
}
