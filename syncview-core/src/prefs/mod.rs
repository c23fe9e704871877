//! Persistent view preferences.
//!
//! File format:
//! [4B] Magic "SVPF"
//! [4B] Version (u32 LE)
//! [4B] Payload length (u32 LE)
//! [NB] Payload (postcard)
//! [4B] CRC32 checksum of all preceding bytes

mod stored;

pub use stored::{PREFS_MAGIC, PREFS_VERSION, StoredPrefs};

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{Result, SyncError};

const PREFS_FILE_NAME: &str = "view.prefs";

/// Location of the preferences file under a configuration directory
pub fn prefs_path_in(config_dir: &Path) -> PathBuf {
    config_dir.join("syncview").join(PREFS_FILE_NAME)
}

pub fn save_prefs(path: &Path, prefs: &StoredPrefs) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut data = Vec::new();
    data.extend_from_slice(&PREFS_MAGIC);
    data.extend_from_slice(&PREFS_VERSION.to_le_bytes());

    let payload = postcard::to_allocvec(prefs)
        .map_err(|e| SyncError::Prefs(format!("Failed to serialize preferences: {}", e)))?;
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&payload);

    let checksum = crc32fast::hash(&data);
    data.extend_from_slice(&checksum.to_le_bytes());

    // Write to a temp file then rename so readers never see half a file
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| SyncError::Prefs("Preferences file truncated".to_string()))
}

pub fn load_prefs(path: &Path) -> Result<StoredPrefs> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;

    // magic(4) + version(4) + len(4) + checksum(4)
    if data.len() < 16 {
        return Err(SyncError::Prefs("Preferences file too small".to_string()));
    }

    let checksum_offset = data.len() - 4;
    let stored_checksum = read_u32(&data, checksum_offset)?;
    if stored_checksum != crc32fast::hash(&data[..checksum_offset]) {
        return Err(SyncError::Prefs(
            "Preferences checksum mismatch".to_string(),
        ));
    }

    if data[..4] != PREFS_MAGIC {
        return Err(SyncError::Prefs("Invalid preferences magic".to_string()));
    }

    let version = read_u32(&data, 4)?;
    if version != PREFS_VERSION {
        return Err(SyncError::Prefs(format!(
            "Preferences version mismatch: expected {}, got {}",
            PREFS_VERSION, version
        )));
    }

    let len = read_u32(&data, 8)? as usize;
    let start = 12;
    if start + len > checksum_offset {
        return Err(SyncError::Prefs("Invalid payload length".to_string()));
    }

    postcard::from_bytes(&data[start..start + len])
        .map_err(|e| SyncError::Prefs(format!("Failed to deserialize preferences: {}", e)))
}

/// Handle on the preferences file. Loading never fails: a missing or
/// unreadable file yields the defaults.
#[derive(Debug, Clone)]
pub struct PrefsFile {
    path: PathBuf,
}

impl PrefsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> StoredPrefs {
        match load_prefs(&self.path) {
            Ok(prefs) => {
                debug!(path = %self.path.display(), "loaded preferences");
                prefs
            }
            Err(SyncError::Io(e)) if e.kind() == ErrorKind::NotFound => StoredPrefs::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable preferences");
                StoredPrefs::default()
            }
        }
    }

    pub fn save(&self, prefs: &StoredPrefs) -> Result<()> {
        save_prefs(&self.path, prefs)
    }
}
