use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use fd_lock::{RwLock, RwLockWriteGuard};
use mxr_events::MatrixDescriptor;
use mxr_host::HostConfig;
use mxr_store::{FsStateStore, Reconciler};
use tracing_subscriber::EnvFilter;

/// Lock file guarding a state directory against concurrent writers.
const LOCK_FILE: &str = ".lock";

/// Apply `<state_dir>/.env` to the process environment. Variables that are
/// already set keep their value. Returns the keys that were applied.
pub fn load_state_env(state_dir: &Path) -> Result<Vec<String>> {
    let env_path = state_dir.join(".env");
    if !env_path.is_file() {
        return Ok(Vec::new());
    }
    let entries = dotenvy::from_path_iter(&env_path)
        .with_context(|| format!("read {}", env_path.display()))?;
    let mut applied = Vec::new();
    for entry in entries {
        let (key, value) = entry.with_context(|| format!("parse {}", env_path.display()))?;
        if std::env::var_os(&key).is_some() {
            continue;
        }
        unsafe {
            std::env::set_var(&key, value);
        }
        applied.push(key);
    }
    Ok(applied)
}

/// Logs go to stderr so stdout stays machine-readable.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the writer lock of a state directory, creating the directory.
pub fn state_lock(state_dir: &Path) -> Result<RwLock<File>> {
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("create state dir {}", state_dir.display()))?;
    let path = state_dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    Ok(RwLock::new(file))
}

/// Become the only writer of the state directory for as long as the guard
/// lives. Fails at once if another process holds it.
pub fn hold_writer<'a>(
    lock: &'a mut RwLock<File>,
    state_dir: &Path,
) -> Result<RwLockWriteGuard<'a, File>> {
    match lock.try_write() {
        Ok(guard) => Ok(guard),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => bail!(
            "state dir {} is in use by another mxr process (is `mxr consume` running?)",
            state_dir.display()
        ),
        Err(err) => Err(err).with_context(|| format!("lock state dir {}", state_dir.display())),
    }
}

pub fn open_reconciler(config: &HostConfig) -> Result<Reconciler> {
    let store = FsStateStore::open(&config.state_dir)
        .with_context(|| format!("open state dir {}", config.state_dir.display()))?;
    Ok(Reconciler::open(Arc::new(store)))
}

/// Parse `<id>:<rows>x<columns>`, e.g. `a:2x3`.
pub fn parse_matrix(s: &str) -> Result<MatrixDescriptor> {
    let (id, shape) = s
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("expected <id>:<rows>x<columns>, got '{s}'"))?;
    let (rows, columns) = shape
        .split_once('x')
        .ok_or_else(|| anyhow!("expected <rows>x<columns>, got '{shape}'"))?;
    let rows: u32 = rows.parse().with_context(|| format!("invalid rows '{rows}'"))?;
    let columns: u32 = columns
        .parse()
        .with_context(|| format!("invalid columns '{columns}'"))?;
    if id.is_empty() || rows == 0 || columns == 0 {
        anyhow::bail!("matrix '{s}' must have an id and a non-empty shape");
    }
    Ok(MatrixDescriptor::new(id, rows, columns))
}

/// Render a cell value the way the grid shows it.
pub fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => ".".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_writer_is_refused() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state");
        let mut first = state_lock(&state).unwrap();
        let mut second = state_lock(&state).unwrap();

        let guard = hold_writer(&mut first, &state).unwrap();
        let err = hold_writer(&mut second, &state).unwrap_err();
        assert!(err.to_string().contains("in use"), "{err}");

        drop(guard);
        assert!(hold_writer(&mut second, &state).is_ok());
    }

    #[test]
    fn state_env_does_not_override_set_variables() {
        let dir = TempDir::new().unwrap();
        assert!(load_state_env(dir.path()).unwrap().is_empty());

        std::fs::write(
            dir.path().join(".env"),
            "MXR_UTIL_TEST_ONLY_FROM_FILE=1\nPATH=/nowhere\n",
        )
        .unwrap();
        let path_before = std::env::var_os("PATH");
        let applied = load_state_env(dir.path()).unwrap();
        assert_eq!(applied, ["MXR_UTIL_TEST_ONLY_FROM_FILE"]);
        assert_eq!(
            std::env::var("MXR_UTIL_TEST_ONLY_FROM_FILE").as_deref(),
            Ok("1")
        );
        assert_eq!(std::env::var_os("PATH"), path_before);
    }

    #[test]
    fn parses_matrix_argument() {
        assert_eq!(
            parse_matrix("a:2x3").unwrap(),
            MatrixDescriptor::new("a", 2, 3)
        );
        assert_eq!(
            parse_matrix("ns:id:1x1").unwrap(),
            MatrixDescriptor::new("ns:id", 1, 1)
        );
        assert!(parse_matrix("a").is_err());
        assert!(parse_matrix("a:2").is_err());
        assert!(parse_matrix("a:0x2").is_err());
        assert!(parse_matrix(":2x2").is_err());
    }

    #[test]
    fn formats_missing_cells() {
        assert_eq!(format_cell(Some(5.0)), "5");
        assert_eq!(format_cell(Some(2.5)), "2.5");
        assert_eq!(format_cell(None), ".");
    }
}
