use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::catalog::VariantKind;
use crate::core::error::{CatalogError, CatalogResult};

/// Hash-addressed blob tree rooted at the data directory.
///
/// Layout: `mods/{tag}/{content_hash}/{name}.{variant}`. Blobs are immutable
/// once written; a path that already exists is never rewritten.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store-relative path (also the public URL path) of a blob.
    pub fn storage_url(
        tag: &str,
        content_hash: &str,
        name_without_extension: &str,
        kind: VariantKind,
    ) -> String {
        format!("mods/{tag}/{content_hash}/{name_without_extension}.{kind}")
    }

    /// Directory holding every blob of one tag.
    pub fn tag_dir(&self, tag: &str) -> PathBuf {
        self.root.join("mods").join(tag)
    }

    /// Write `bytes` at `storage_url` unless a blob is already there.
    ///
    /// Returns `true` when a new blob was written. Writes go through a
    /// temporary file and a rename, so two writers racing on the same
    /// content leave one complete, identical blob. A `storage_url` that is
    /// not a plain relative path under the root is refused.
    pub async fn put_if_absent(&self, storage_url: &str, bytes: &[u8]) -> CatalogResult<bool> {
        let relative = Path::new(storage_url);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(CatalogError::Validation(format!(
                "storage path {storage_url:?} leaves the content store"
            )));
        }
        let dest = self.root.join(relative);

        let exists = tokio::fs::try_exists(&dest)
            .await
            .map_err(|e| CatalogError::Io {
                path: dest.clone(),
                source: e,
            })?;
        if exists {
            debug!("Blob already stored: {}", storage_url);
            return Ok(false);
        }

        let parent = dest
            .parent()
            .ok_or_else(|| CatalogError::Other(format!("invalid storage path {storage_url}")))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CatalogError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;

        let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        write_atomically(&tmp, &dest, bytes).await?;

        info!("Blob stored: {} ({} bytes)", storage_url, bytes.len());
        Ok(true)
    }

    /// Tags that currently have a blob directory.
    pub async fn tag_dirs(&self) -> CatalogResult<Vec<String>> {
        let mods_dir = self.root.join("mods");
        let mut tags = Vec::new();

        let mut entries = match tokio::fs::read_dir(&mods_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tags),
            Err(e) => {
                return Err(CatalogError::Io {
                    path: mods_dir,
                    source: e,
                })
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| CatalogError::Io {
            path: mods_dir.clone(),
            source: e,
        })? {
            if entry.path().is_dir() {
                tags.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        Ok(tags)
    }

    /// Recursively delete everything stored for `tag`. Missing is fine.
    pub async fn remove_tag(&self, tag: &str) -> CatalogResult<()> {
        let dir = self.tag_dir(tag);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("Removed blob directory {:?}", dir);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CatalogError::Io {
                path: dir,
                source: e,
            }),
        }
    }
}

/// Write `bytes` to `tmp`, then rename it onto `dest`. The temp file never
/// outlives a failure.
async fn write_atomically(tmp: &Path, dest: &Path, bytes: &[u8]) -> CatalogResult<()> {
    let result = async {
        let io_err = |e| CatalogError::Io {
            path: tmp.to_path_buf(),
            source: e,
        };
        let mut file = tokio::fs::File::create(tmp).await.map_err(io_err)?;
        file.write_all(bytes).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        drop(file);

        tokio::fs::rename(tmp, dest)
            .await
            .map_err(|e| CatalogError::Io {
                path: dest.to_path_buf(),
                source: e,
            })
    }
    .await;

    if result.is_err() {
        if let Err(cleanup) = tokio::fs::remove_file(tmp).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove temp file {:?}: {}", tmp, cleanup);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().unwrap().is_file())
            .count()
    }

    #[test]
    fn storage_url_layout() {
        assert_eq!(
            ContentStore::storage_url("wotstat.analytics", "ab12", "wotstat.analytics_1.0", VariantKind::Mtmod),
            "mods/wotstat.analytics/ab12/wotstat.analytics_1.0.mtmod"
        );
    }

    #[tokio::test]
    async fn same_bytes_twice_leaves_one_blob() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ContentStore::new(tmp.path().to_path_buf());
        let url = ContentStore::storage_url("t", "hash", "mod_1.0", VariantKind::Wotmod);

        assert!(store.put_if_absent(&url, b"payload").await.unwrap());
        assert!(!store.put_if_absent(&url, b"payload").await.unwrap());

        let dir = tmp.path().join("mods/t/hash");
        assert_eq!(count_files(&dir), 1);
        assert_eq!(std::fs::read(dir.join("mod_1.0.wotmod")).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn remove_tag_deletes_tree_and_tolerates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ContentStore::new(tmp.path().to_path_buf());
        let url = ContentStore::storage_url("gone", "h", "m", VariantKind::Mtmod);
        store.put_if_absent(&url, b"x").await.unwrap();

        assert_eq!(store.tag_dirs().await.unwrap(), vec!["gone".to_string()]);

        store.remove_tag("gone").await.unwrap();
        assert!(!store.tag_dir("gone").exists());
        assert!(store.tag_dirs().await.unwrap().is_empty());

        store.remove_tag("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn paths_outside_the_root_are_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("store");
        let store = ContentStore::new(root.clone());

        for url in [
            "mods/t/h/../../../../evil_1.0.wotmod",
            "/etc/evil.wotmod",
            "./mods/t/h/m.wotmod",
        ] {
            let err = store.put_if_absent(url, b"x").await.unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)), "{url} accepted");
        }
        assert!(!tmp.path().join("evil_1.0.wotmod").exists());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        // A non-empty directory at the destination makes the rename fail.
        let dest = tmp.path().join("m.wotmod");
        std::fs::create_dir_all(dest.join("occupied")).unwrap();
        let temp_file = tmp.path().join(".pending.tmp");

        let err = write_atomically(&temp_file, &dest, b"x").await.unwrap_err();

        assert!(matches!(err, CatalogError::Io { .. }));
        assert!(!temp_file.exists());
        assert!(dest.join("occupied").is_dir());
    }
}
