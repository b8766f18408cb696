// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { executable: bool },
    Dir { children: Vec<String>, writable: bool },
}

/// In-memory filesystem for tests. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>) {
        self.insert_file(path.as_ref(), false);
    }

    pub fn add_executable(&self, path: impl AsRef<Path>) {
        self.insert_file(path.as_ref(), true);
    }

    /// Add a directory that refuses writes.
    pub fn add_readonly_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut files = self.lock();
        Self::ensure_dir_entry(&mut files, path);
        if let Some(MockEntry::Dir { writable, .. }) = files.get_mut(path) {
            *writable = false;
        }
    }

    /// Sorted list of every file path currently present.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        let files = self.lock();
        let mut paths: Vec<PathBuf> = files
            .iter()
            .filter(|(_, entry)| matches!(entry, MockEntry::File { .. }))
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert_file(&self, path: &Path, executable: bool) {
        let mut files = self.lock();
        files.insert(path.to_path_buf(), MockEntry::File { executable });

        // Ensure parent directories exist implicitly for simplicity in this mock
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                Self::ensure_dir_entry(&mut files, parent);
                Self::link_child(&mut files, parent, path);
            }
        }
    }

    fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if files.contains_key(path) {
            return;
        }
        files.insert(
            path.to_path_buf(),
            MockEntry::Dir {
                children: Vec::new(),
                writable: true,
            },
        );
        if let Some(parent) = path.parent() {
            // Avoid infinite loop at root
            if !parent.as_os_str().is_empty() && parent != path {
                Self::ensure_dir_entry(files, parent);
                Self::link_child(files, parent, path);
            }
        }
    }

    fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
        if let Some(MockEntry::Dir { children, .. }) = files.get_mut(parent) {
            if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
                if !children.iter().any(|c| c == name) {
                    children.push(name.to_string());
                }
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Dir { .. }))
    }

    fn is_executable(&self, path: &Path) -> bool {
        matches!(
            self.lock().get(path),
            Some(MockEntry::File { executable: true })
        )
    }

    fn is_writable_dir(&self, path: &Path) -> bool {
        matches!(
            self.lock().get(path),
            Some(MockEntry::Dir { writable: true, .. })
        )
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut files = self.lock();
        match files.get(path) {
            Some(MockEntry::File { .. }) => return Err(anyhow!("Not a directory: {:?}", path)),
            Some(MockEntry::Dir { .. }) => return Ok(()),
            None => {}
        }
        let nearest = path.ancestors().skip(1).find_map(|a| files.get(a));
        if let Some(MockEntry::Dir { writable: false, .. }) = nearest {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        Self::ensure_dir_entry(&mut files, path);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut files = self.lock();
        match files.remove(path) {
            Some(MockEntry::File { .. }) => {
                if let Some(parent) = path.parent() {
                    if let Some(MockEntry::Dir { children, .. }) = files.get_mut(parent) {
                        let name = path.file_name().and_then(|n| n.to_str());
                        children.retain(|c| Some(c.as_str()) != name);
                    }
                }
                Ok(())
            }
            Some(dir @ MockEntry::Dir { .. }) => {
                files.insert(path.to_path_buf(), dir);
                Err(anyhow!("Is a directory: {:?}", path))
            }
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.lock().get(path) {
            Some(MockEntry::Dir { children, .. }) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
