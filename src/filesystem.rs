use log::{debug, info};
use std::{collections::BTreeMap, fs, path::Path};

use crate::error::{FsError, Result};

pub type FsResult<T> = std::result::Result<T, FsError>;

/// The simulated file hierarchy the `ls`, `cd`, `read`, `exec`, `mkdir`,
/// `touch` and `write` built-ins operate on. Every path argument is resolved
/// against the current directory with [`resolve_path`].
pub trait FileSystem {
    fn current_dir(&self) -> String;

    /// Entry names in alphabetical order; `None` lists the current directory.
    fn list_files(&self, path: Option<&str>) -> FsResult<Vec<String>>;

    fn navigate(&mut self, path: &str) -> FsResult<String>;

    fn read_file(&self, path: &str) -> FsResult<String>;

    fn make_dir(&mut self, name: &str) -> FsResult<String>;

    fn new_file(&mut self, path: &str) -> FsResult<String>;

    fn save_file(&mut self, path: &str, contents: &str) -> FsResult<String>;
}

/// Resolves `target` against the absolute directory `current`.
///
/// A leading `'` string marker is dropped, a leading `/` starts from the root,
/// `..` pops one component (never above the root), and empty or `.`
/// components are ignored, so repeated slashes collapse.
pub fn resolve_path(current: &str, target: &str) -> String {
    let target = target.strip_prefix('\'').unwrap_or(target);

    let mut components: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        current.split('/').filter(|c| !c.is_empty()).collect()
    };

    for component in target.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            name => components.push(name),
        }
    }

    format!("/{}", components.join("/"))
}

/// Splits an absolute path into its parent directory and final name.
/// Returns `None` for the root, which has no parent.
fn split_path(path: &str) -> Option<(String, &str)> {
    let (parent, name) = path.rsplit_once('/')?;
    if name.is_empty() {
        return None;
    }
    let parent = if parent.is_empty() { "/" } else { parent };
    Some((parent.to_string(), name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Directory,
    File(String),
}

/// In-memory store: one table of entries per absolute directory path.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    directories: BTreeMap<String, BTreeMap<String, Entry>>,
    current: String,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut directories = BTreeMap::new();
        directories.insert("/".to_string(), BTreeMap::new());
        MemoryFs {
            directories,
            current: "/".to_string(),
        }
    }

    /// Mirrors a host directory tree into a fresh store rooted at `/`.
    pub fn seeded(root: &Path) -> Result<Self> {
        let mut store = Self::new();
        store.copy_host_dir(root, "/")?;
        info!(
            "seeded {} directories from {}",
            store.directories.len(),
            root.display()
        );
        Ok(store)
    }

    fn copy_host_dir(&mut self, host_dir: &Path, virtual_dir: &str) -> Result<()> {
        let mut entries = fs::read_dir(host_dir)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let target = resolve_path(virtual_dir, &name);

            if entry.file_type()?.is_dir() {
                self.make_dir(&target)?;
                self.copy_host_dir(&entry.path(), &target)?;
            } else {
                let contents = fs::read_to_string(entry.path())?;
                self.save_file(&target, &contents)?;
            }
        }

        Ok(())
    }

    fn resolve(&self, path: &str) -> String {
        resolve_path(&self.current, path)
    }

    fn entry(&self, resolved: &str) -> Option<&Entry> {
        let (parent, name) = split_path(resolved)?;
        self.directories.get(&parent)?.get(name)
    }

    /// Table of the parent directory that would hold `resolved`.
    fn parent_table(&mut self, resolved: &str) -> FsResult<(&mut BTreeMap<String, Entry>, String)> {
        let (parent, name) =
            split_path(resolved).ok_or_else(|| FsError::AlreadyExists(resolved.to_string()))?;
        let name = name.to_string();
        match self.directories.get_mut(&parent) {
            Some(table) => Ok((table, name)),
            None => Err(FsError::PathNotFound(parent)),
        }
    }
}

impl FileSystem for MemoryFs {
    fn current_dir(&self) -> String {
        self.current.clone()
    }

    fn list_files(&self, path: Option<&str>) -> FsResult<Vec<String>> {
        let dir = path.map_or_else(|| self.current.clone(), |p| self.resolve(p));
        self.directories
            .get(&dir)
            .map(|table| table.keys().cloned().collect())
            .ok_or(FsError::PathNotFound(dir))
    }

    fn navigate(&mut self, path: &str) -> FsResult<String> {
        let new_path = self.resolve(path);
        if !self.directories.contains_key(&new_path) {
            return Err(FsError::PathNotFound(new_path));
        }
        debug!("cd {} -> {}", self.current, new_path);
        self.current = new_path.clone();
        Ok(new_path)
    }

    fn read_file(&self, path: &str) -> FsResult<String> {
        let resolved = self.resolve(path);
        if self.directories.contains_key(&resolved) {
            return Err(FsError::IsDirectory(resolved));
        }
        match self.entry(&resolved) {
            Some(Entry::File(contents)) => Ok(contents.clone()),
            Some(Entry::Directory) => Err(FsError::IsDirectory(resolved)),
            None => Err(FsError::NotFound(resolved)),
        }
    }

    fn make_dir(&mut self, name: &str) -> FsResult<String> {
        let resolved = self.resolve(name);
        let (table, entry_name) = self.parent_table(&resolved)?;
        if table.contains_key(&entry_name) {
            return Err(FsError::AlreadyExists(resolved));
        }
        table.insert(entry_name, Entry::Directory);
        self.directories.insert(resolved.clone(), BTreeMap::new());
        debug!("mkdir {}", resolved);
        Ok(resolved)
    }

    fn new_file(&mut self, path: &str) -> FsResult<String> {
        let resolved = self.resolve(path);
        let (table, entry_name) = self.parent_table(&resolved)?;
        if table.contains_key(&entry_name) {
            return Err(FsError::AlreadyExists(resolved));
        }
        table.insert(entry_name, Entry::File(String::new()));
        debug!("touch {}", resolved);
        Ok(resolved)
    }

    fn save_file(&mut self, path: &str, contents: &str) -> FsResult<String> {
        let resolved = self.resolve(path);
        if resolved == "/" {
            return Err(FsError::IsDirectory(resolved));
        }
        let (table, entry_name) = self.parent_table(&resolved)?;
        if let Some(Entry::Directory) = table.get(&entry_name) {
            return Err(FsError::IsDirectory(resolved));
        }
        table.insert(entry_name, Entry::File(contents.to_string()));
        debug!("saved {} bytes to {}", contents.len(), resolved);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("/", "docs"), "/docs");
        assert_eq!(resolve_path("/docs", "notes/today"), "/docs/notes/today");
        assert_eq!(resolve_path("/docs/notes", ".."), "/docs");
        assert_eq!(resolve_path("/docs", "../.."), "/");
        assert_eq!(resolve_path("/docs", "/"), "/");
        assert_eq!(resolve_path("/docs", "/bin//tools/"), "/bin/tools");
        assert_eq!(resolve_path("/docs", "'readme"), "/docs/readme");
        assert_eq!(resolve_path("/a", "./b/../c"), "/a/c");
    }

    #[test]
    fn test_mkdir_then_navigate() -> FsResult<()> {
        let mut store = MemoryFs::new();
        assert_eq!(store.make_dir("x")?, "/x");
        assert_eq!(store.navigate("x")?, "/x");
        assert_eq!(store.current_dir(), "/x");
        assert_eq!(store.list_files(Some(".."))?, vec!["x"]);
        assert!(store.list_files(None)?.is_empty());
        assert_eq!(store.navigate("..")?, "/");
        Ok(())
    }

    #[test]
    fn test_navigate_missing_path() {
        let mut store = MemoryFs::new();
        assert_eq!(
            store.navigate("nope"),
            Err(FsError::PathNotFound("/nope".to_string()))
        );
        assert_eq!(store.current_dir(), "/");
    }

    #[test]
    fn test_listing_is_sorted() -> FsResult<()> {
        let mut store = MemoryFs::new();
        store.save_file("zeta", "z")?;
        store.make_dir("alpha")?;
        store.new_file("mid")?;
        assert_eq!(store.list_files(None)?, vec!["alpha", "mid", "zeta"]);
        assert_eq!(
            store.list_files(Some("missing")),
            Err(FsError::PathNotFound("/missing".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_make_dir_conflicts() -> FsResult<()> {
        let mut store = MemoryFs::new();
        store.make_dir("x")?;
        assert_eq!(
            store.make_dir("x"),
            Err(FsError::AlreadyExists("/x".to_string()))
        );
        store.save_file("f", "")?;
        assert_eq!(
            store.make_dir("f"),
            Err(FsError::AlreadyExists("/f".to_string()))
        );
        assert_eq!(
            store.make_dir("a/b"),
            Err(FsError::PathNotFound("/a".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_read_and_save() -> FsResult<()> {
        let mut store = MemoryFs::new();
        store.make_dir("docs")?;
        assert_eq!(store.save_file("docs/a.txt", "hello")?, "/docs/a.txt");
        assert_eq!(store.read_file("/docs/a.txt")?, "hello");

        store.save_file("docs/a.txt", "again")?;
        assert_eq!(store.read_file("docs/a.txt")?, "again");

        assert_eq!(
            store.read_file("docs/b.txt"),
            Err(FsError::NotFound("/docs/b.txt".to_string()))
        );
        assert_eq!(
            store.read_file("docs"),
            Err(FsError::IsDirectory("/docs".to_string()))
        );
        assert_eq!(
            store.save_file("docs", "x"),
            Err(FsError::IsDirectory("/docs".to_string()))
        );
        assert_eq!(
            store.new_file("docs/a.txt"),
            Err(FsError::AlreadyExists("/docs/a.txt".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_seeded_from_host() -> Result<()> {
        let root = std::env::temp_dir().join(format!("ecmachine-seed-{}", std::process::id()));
        fs::create_dir_all(root.join("scripts"))?;
        fs::write(root.join("scripts").join("add.lisp"), "(+ 1 2)")?;
        fs::write(root.join("motd"), "welcome")?;

        let store = MemoryFs::seeded(&root)?;
        fs::remove_dir_all(&root)?;

        assert_eq!(store.list_files(None)?, vec!["motd", "scripts"]);
        assert_eq!(store.read_file("scripts/add.lisp")?, "(+ 1 2)");
        assert_eq!(store.read_file("motd")?, "welcome");
        Ok(())
    }
}
