use crate::error::KvResult;
use crate::store::Store;
use crate::store::item::now_seconds;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tracing::info;

/// Restore `store` from the backup at `path`. A missing file is an empty start.
pub async fn load(store: &Store, path: &Path) -> KvResult<usize> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No backup at {}, starting empty", path.display());
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);
    let count = store.restore(&mut reader).await?;
    info!("Loaded {count} items from {}", path.display());
    Ok(count)
}

/// Where an existing backup is moved before a new one is written:
/// `<unix-seconds>_<file name>` next to the original. A nonzero `seq` tells
/// apart several rotations within the same second: `<unix-seconds>-<seq>_<file name>`.
pub fn rotated_path(path: &Path, now: i64, seq: u32) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if seq == 0 {
        path.with_file_name(format!("{now}_{name}"))
    } else {
        path.with_file_name(format!("{now}-{seq}_{name}"))
    }
}

/// First rotated name for `now` that no file occupies yet.
pub async fn free_rotated_path(path: &Path, now: i64) -> io::Result<PathBuf> {
    let mut seq = 0;
    loop {
        let candidate = rotated_path(path, now, seq);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        seq += 1;
    }
}

/// Rename an existing backup aside. Returns the new location, if anything moved.
///
/// An earlier rotated file is never overwritten.
pub async fn rotate_aside(path: &Path) -> KvResult<Option<PathBuf>> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(None);
    }
    let target = free_rotated_path(path, now_seconds()).await?;
    tokio::fs::rename(path, &target).await?;
    info!("Moved previous backup to {}", target.display());
    Ok(Some(target))
}

/// Write a full backup of `store` to `path`, keeping any previous file aside.
pub async fn save(store: &Store, path: &Path) -> KvResult<usize> {
    rotate_aside(path).await?;
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);
    let count = store.backup(&mut writer).await?;
    writer.flush().await?;
    writer.get_ref().sync_all().await?;
    info!("Backed up {count} items to {}", path.display());
    Ok(count)
}
