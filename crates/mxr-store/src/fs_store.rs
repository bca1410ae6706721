use crate::{StateStore, StoreResult, io_error, validate_key};
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

/// Filesystem-backed record store; each record lives at `<root>/<key>.json`.
#[derive(Clone)]
pub struct FsStateStore {
    root: PathBuf,
}

impl fmt::Debug for FsStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsStateStore")
            .field("root", &self.root)
            .finish()
    }
}

impl FsStateStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Write to a sibling temp file, fsync, then rename over the record so a
    /// crash leaves either the old or the new contents.
    fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let tmp = path.with_extension("json.tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|e| io_error(&tmp, e))?;
        file.write_all(bytes).map_err(|e| io_error(&tmp, e))?;
        file.sync_all().map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| io_error(path, e))?;
        Ok(())
    }
}

impl StateStore for FsStateStore {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        validate_key(key)?;
        let path = self.record_path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(path, err)),
        }
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        validate_key(key)?;
        Self::write_atomic(&self.record_path(key), value.as_bytes())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        let path = self.record_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(path, err)),
        }
    }
}
