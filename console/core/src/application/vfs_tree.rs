// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! VFS Tree - Lazily populated directory tree of one client's VFS
//!
//! Each directory is listed on first expansion and served from the cache
//! afterwards. A directory refresh on the endpoint invalidates the cached
//! subtree so the next expansion lists it again.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Cached navigation over `VFSListDirectory`
//! - **Integration:** `VfsTree` → `DirectoryLister` (implemented by `ApiClient`)

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::api::VfsEntry;
use crate::domain::api_error::ApiError;
use crate::domain::vfs_path::VfsPath;

/// Source of directory listings.
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    async fn list(
        &self,
        client_id: &str,
        path: &VfsPath,
        cancel: &CancellationToken,
    ) -> Result<Vec<VfsEntry>, ApiError>;
}

/// One expanded level of the tree.
#[derive(Debug, Clone)]
pub struct TreeLevel {
    pub path: VfsPath,
    pub entries: Arc<[VfsEntry]>,
}

impl TreeLevel {
    /// Expandable children, in listing order.
    pub fn subdirectories(&self) -> impl Iterator<Item = VfsPath> + '_ {
        self.entries
            .iter()
            .filter(|entry| entry.is_directory())
            .map(|entry| self.path.join(entry.name.clone()))
    }

    pub fn entry(&self, name: &str) -> Option<&VfsEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

pub struct VfsTree {
    lister: Arc<dyn DirectoryLister>,
    client_id: String,
    nodes: RwLock<HashMap<VfsPath, Arc<[VfsEntry]>>>,
}

impl VfsTree {
    pub fn new(lister: Arc<dyn DirectoryLister>, client_id: impl Into<String>) -> Self {
        Self {
            lister,
            client_id: client_id.into(),
            nodes: RwLock::new(HashMap::new()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn is_cached(&self, path: &VfsPath) -> bool {
        self.nodes.read().contains_key(path)
    }

    /// Contents of `path`, listing it only if not cached.
    pub async fn expand(
        &self,
        path: &VfsPath,
        cancel: &CancellationToken,
    ) -> Result<TreeLevel, ApiError> {
        if let Some(entries) = self.nodes.read().get(path).cloned() {
            return Ok(TreeLevel {
                path: path.clone(),
                entries,
            });
        }

        debug!(client_id = %self.client_id, path = %path, "Listing VFS directory");
        let entries: Arc<[VfsEntry]> = self.lister.list(&self.client_id, path, cancel).await?.into();

        // Results of a cancelled navigation are not cached.
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        self.nodes.write().insert(path.clone(), entries.clone());
        Ok(TreeLevel {
            path: path.clone(),
            entries,
        })
    }

    /// Expand every level from the root down to `path`.
    ///
    /// Descent stops at the first component that is not a directory of its
    /// parent; the returned levels end at the deepest directory reached.
    pub async fn expand_to(
        &self,
        path: &VfsPath,
        cancel: &CancellationToken,
    ) -> Result<Vec<TreeLevel>, ApiError> {
        let mut levels = vec![self.expand(&VfsPath::root(), cancel).await?];

        for crumb in path.breadcrumbs() {
            let Some(name) = crumb.file_name() else {
                break;
            };
            let parent = &levels[levels.len() - 1];
            let is_directory = parent.entry(name).is_some_and(VfsEntry::is_directory);
            if !is_directory {
                debug!(path = %crumb, "Stopping descent at non-directory");
                break;
            }
            levels.push(self.expand(&crumb, cancel).await?);
        }

        Ok(levels)
    }

    /// Drop `path` and everything below it from the cache.
    pub fn invalidate(&self, path: &VfsPath) {
        self.nodes.write().retain(|cached, _| !cached.starts_with(path));
    }

    pub fn clear(&self) {
        self.nodes.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeLister {
        calls: AtomicUsize,
    }

    fn entry(name: &str, mode: &str) -> VfsEntry {
        VfsEntry {
            name: name.to_string(),
            mode: mode.to_string(),
            ..Default::default()
        }
    }

    #[async_trait]
    impl DirectoryLister for FakeLister {
        async fn list(
            &self,
            _client_id: &str,
            path: &VfsPath,
            _cancel: &CancellationToken,
        ) -> Result<Vec<VfsEntry>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let names: Vec<&str> = path.components().iter().map(String::as_str).collect();
            Ok(match names.as_slice() {
                [] => vec![entry("file", "d---------"), entry("ntfs", "d---------")],
                ["file"] => vec![entry("etc", "drwxr-xr-x"), entry("vmlinuz", "Lrwxrwxrwx")],
                ["file", "etc"] => vec![entry("passwd", "-rw-r--r--")],
                _ => vec![],
            })
        }
    }

    fn tree() -> (Arc<FakeLister>, VfsTree) {
        let lister = Arc::new(FakeLister {
            calls: AtomicUsize::new(0),
        });
        let tree = VfsTree::new(lister.clone(), "C.1");
        (lister, tree)
    }

    #[tokio::test]
    async fn test_expand_lists_once() {
        let (lister, tree) = tree();
        let cancel = CancellationToken::new();
        let path = VfsPath::parse("/file");

        let first = tree.expand(&path, &cancel).await.unwrap();
        let second = tree.expand(&path, &cancel).await.unwrap();

        assert_eq!(first.entries.len(), 2);
        assert_eq!(second.entries.len(), 2);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            first.subdirectories().collect::<Vec<_>>(),
            vec![VfsPath::parse("/file/etc"), VfsPath::parse("/file/vmlinuz")]
        );
    }

    #[tokio::test]
    async fn test_expand_to_stops_at_files() {
        let (lister, tree) = tree();
        let cancel = CancellationToken::new();

        let levels = tree
            .expand_to(&VfsPath::parse("/file/etc/passwd"), &cancel)
            .await
            .unwrap();
        let paths: Vec<String> = levels.iter().map(|level| level.path.to_string()).collect();

        assert_eq!(paths, vec!["", "/file", "/file/etc"]);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalidate_drops_subtree() {
        let (lister, tree) = tree();
        let cancel = CancellationToken::new();
        tree.expand_to(&VfsPath::parse("/file/etc"), &cancel)
            .await
            .unwrap();

        tree.invalidate(&VfsPath::parse("/file"));
        assert!(tree.is_cached(&VfsPath::root()));
        assert!(!tree.is_cached(&VfsPath::parse("/file")));
        assert!(!tree.is_cached(&VfsPath::parse("/file/etc")));

        tree.expand(&VfsPath::parse("/file"), &cancel).await.unwrap();
        assert_eq!(lister.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cancelled_listing_not_cached() {
        let (_lister, tree) = tree();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = tree.expand(&VfsPath::root(), &cancel).await;
        assert_eq!(result.unwrap_err(), ApiError::Cancelled);
        assert!(!tree.is_cached(&VfsPath::root()));
    }
}
