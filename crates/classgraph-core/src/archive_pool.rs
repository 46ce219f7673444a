//! Per-archive free-list of open ZIP readers, with nested-archive
//! materialization to temporary files. Safe to call concurrently.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use zip::ZipArchive;

use crate::error::Error;
use crate::path_resolver::ClasspathIdentity;

type Reader = ZipArchive<File>;

struct ArchiveState {
    free: Vec<Reader>,
    /// Populated the first time a nested archive under this identity is
    /// materialized; subsequent acquires reopen this file.
    materialized_path: Option<PathBuf>,
}

/// Owns reusable ZIP readers for every archive identity seen during a scan,
/// plus the temp files created to materialize nested archives.
pub struct ArchiveHandlePool {
    states: Mutex<HashMap<ClasspathIdentity, ArchiveState>>,
    temp_dir: tempfile::TempDir,
}

impl ArchiveHandlePool {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            states: Mutex::new(HashMap::new()),
            temp_dir: tempfile::tempdir().map_err(|e| Error::new(crate::error::ErrorKind::from(e)))?,
        })
    }

    /// Checks out a reader for `identity`, opening a fresh one (or
    /// materializing a nested archive first) if the free-list is empty.
    pub fn acquire(&self, identity: &ClasspathIdentity) -> Result<PooledArchive<'_>, Error> {
        let mut guard = self.states.lock().expect("archive pool mutex poisoned");
        let state = guard
            .entry(identity.clone())
            .or_insert_with(|| ArchiveState {
                free: Vec::new(),
                materialized_path: None,
            });

        if let Some(reader) = state.free.pop() {
            drop(guard);
            return Ok(PooledArchive {
                pool: self,
                identity: identity.clone(),
                reader: Some(reader),
            });
        }

        let physical_path = if identity.nested_chain().len() <= 1 {
            identity.canonical_path.clone()
        } else {
            self.materialize_nested(identity, state)?
        };
        drop(guard);

        let file = File::open(&physical_path).map_err(|e| Error::new(crate::error::ErrorKind::from(e)))?;
        let reader = ZipArchive::new(file).map_err(|e| Error::new(crate::error::ErrorKind::from(e)))?;
        Ok(PooledArchive {
            pool: self,
            identity: identity.clone(),
            reader: Some(reader),
        })
    }

    /// Walks every chain segment but the last (each one an archive-within-
    /// archive entry) and writes the innermost archive's bytes to a temp
    /// file. The last chain segment is never an entry to extract: it is the
    /// in-archive base directory the caller reads resources under.
    fn materialize_nested(
        &self,
        identity: &ClasspathIdentity,
        state: &mut ArchiveState,
    ) -> Result<PathBuf, Error> {
        if let Some(existing) = &state.materialized_path {
            return Ok(existing.clone());
        }

        let chain = identity.nested_chain();
        let archive_segments = &chain[..chain.len() - 1];

        let outer_file = File::open(&identity.canonical_path)
            .map_err(|e| Error::new(crate::error::ErrorKind::from(e)))?;
        let mut bytes = read_zip_entry_to_end(outer_file, archive_segments[0])?;
        for segment in &archive_segments[1..] {
            let cursor = std::io::Cursor::new(std::mem::take(&mut bytes));
            bytes = read_zip_entry_to_end(cursor, segment)?;
        }

        let temp_path = self
            .temp_dir
            .path()
            .join(format!("nested-{}.jar", uniq_suffix(identity)));
        let mut temp_file =
            File::create(&temp_path).map_err(|e| Error::new(crate::error::ErrorKind::from(e)))?;
        temp_file
            .write_all(&bytes)
            .map_err(|e| Error::new(crate::error::ErrorKind::from(e)))?;

        state.materialized_path = Some(temp_path.clone());
        Ok(temp_path)
    }

    fn release(&self, identity: &ClasspathIdentity, reader: Reader) {
        let mut guard = self.states.lock().expect("archive pool mutex poisoned");
        if let Some(state) = guard.get_mut(identity) {
            state.free.push(reader);
        }
    }
}

fn read_zip_entry_to_end<R: Read + std::io::Seek>(source: R, entry_name: &str) -> Result<Vec<u8>, Error> {
    let mut archive = ZipArchive::new(source).map_err(|e| Error::new(crate::error::ErrorKind::from(e)))?;
    let mut entry = archive
        .by_name(entry_name)
        .map_err(|e| Error::new(crate::error::ErrorKind::from(e)))?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| Error::new(crate::error::ErrorKind::from(e)))?;
    Ok(bytes)
}

fn uniq_suffix(identity: &ClasspathIdentity) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    identity.hash(&mut hasher);
    hasher.finish()
}

/// A checked-out archive reader. Returned to the pool's free-list on drop.
pub struct PooledArchive<'a> {
    pool: &'a ArchiveHandlePool,
    identity: ClasspathIdentity,
    reader: Option<Reader>,
}

impl<'a> PooledArchive<'a> {
    pub fn reader(&mut self) -> &mut Reader {
        self.reader.as_mut().expect("reader taken before drop")
    }
}

impl<'a> Drop for PooledArchive<'a> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            self.pool.release(&self.identity, reader);
        }
    }
}

/// True if `path`'s canonical form lies under the runtime stdlib archive
/// path, used by the Path Resolver's system-archive denial check.
pub fn is_stdlib_archive(path: &Path, stdlib: Option<&Path>) -> bool {
    match stdlib {
        Some(stdlib) => path == stdlib,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::write::SimpleFileOptions;

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, bytes) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn acquire_release_reuses_a_pooled_reader() {
        let dir = tempfile::tempdir().unwrap();
        let jar_path = dir.path().join("plain.jar");
        write_jar(&jar_path, &[("p/Foo.class", b"hi")]);

        let pool = ArchiveHandlePool::new().unwrap();
        let identity = ClasspathIdentity::new(jar_path, "");

        {
            let mut pooled = pool.acquire(&identity).unwrap();
            assert_eq!(pooled.reader().len(), 1);
        }
        // second acquire should reuse the released reader rather than fail
        // to reopen (it would still succeed either way, but this exercises
        // the free-list path).
        let mut pooled = pool.acquire(&identity).unwrap();
        assert_eq!(pooled.reader().len(), 1);
    }

    #[test]
    fn nested_archive_is_materialized_to_a_temp_file() {
        let dir = tempfile::tempdir().unwrap();

        let inner_path = dir.path().join("inner-source.jar");
        write_jar(&inner_path, &[("p/Foo.class", b"inner-bytes")]);
        let inner_bytes = std::fs::read(&inner_path).unwrap();

        let outer_path = dir.path().join("outer.jar");
        write_jar(&outer_path, &[("inner.jar", &inner_bytes)]);

        let pool = ArchiveHandlePool::new().unwrap();
        let identity = ClasspathIdentity::new(outer_path, "inner.jar!/");

        let mut pooled = pool.acquire(&identity).unwrap();
        let mut entry = pooled.reader().by_name("p/Foo.class").unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"inner-bytes");
    }
}
