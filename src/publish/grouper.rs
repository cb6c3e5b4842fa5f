//! File discovery and blob grouping.
//!
//! Files are walked in sorted order and packed into groups whose summed
//! size stays within `max_blob_size`. A file larger than the limit gets a
//! group of its own. The manifest and provenance files are always emitted
//! first, each as a singleton group, so they can be replaced without
//! re-uploading anything else.
//!
//! Each group becomes exactly one blob. When a group holds more than one
//! file, the packed payload starts with a one-byte marker ([`MULTI_FILE_MARKER`])
//! followed by the files' bytes back to back.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::content_type::{self, IDENTITY_ENCODING};
use crate::storage::ContentHash;

/// Site path of the published manifest.
pub const MANIFEST_PATH: &str = "/.well-known/site_manifest.json";

/// Site path of the build provenance attestation.
pub const PROVENANCE_PATH: &str = "/.well-known/provenance.intoto.jsonl";

/// Paths that always occupy a blob of their own, in emission order.
pub const RESERVED_PATHS: [&str; 2] = [MANIFEST_PATH, PROVENANCE_PATH];

/// Leading byte of a payload that packs several files.
pub const MULTI_FILE_MARKER: u8 = 0xff;

/// Hidden directory that is still published.
const WELL_KNOWN_DIR: &str = ".well-known";

/// Grouping errors.
#[derive(Debug, Error)]
pub enum GroupingError {
    #[error("Provided path \"{0}\" does not exist")]
    PathNotFound(PathBuf),

    #[error("Provided path \"{0}\" is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },
}

/// One file to publish.
#[derive(Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Site path, always starting with `/`.
    pub path: String,
    pub size: u64,
    pub hash: ContentHash,
    pub content_type: String,
    pub content_encoding: String,
    pub data: Vec<u8>,
}

impl FileRecord {
    /// Build a record from in-memory bytes.
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        let path = path.into();
        Self {
            content_type: content_type::for_path(&path).to_string(),
            content_encoding: IDENTITY_ENCODING.to_string(),
            size: data.len() as u64,
            hash: ContentHash::digest(&data),
            path,
            data,
        }
    }

    pub fn is_reserved(&self) -> bool {
        RESERVED_PATHS.contains(&self.path.as_str())
    }
}

impl fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRecord")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("hash", &self.hash.to_string())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Files packed into one blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobGroup {
    pub group_id: usize,
    /// Sum of the files' sizes (without the marker byte).
    pub size: u64,
    pub files: Vec<FileRecord>,
}

impl BlobGroup {
    fn new(group_id: usize) -> Self {
        Self {
            group_id,
            size: 0,
            files: Vec::new(),
        }
    }

    fn push(&mut self, file: FileRecord) {
        self.size += file.size;
        self.files.push(file);
    }

    pub fn is_packed(&self) -> bool {
        self.files.len() > 1
    }

    /// Bytes to encode: the files back to back, marker-prefixed when packed.
    pub fn payload(&self) -> Vec<u8> {
        let marker = usize::from(self.is_packed());
        let mut payload = Vec::with_capacity(self.size as usize + marker);
        if self.is_packed() {
            payload.push(MULTI_FILE_MARKER);
        }
        for file in &self.files {
            payload.extend_from_slice(&file.data);
        }
        payload
    }
}

/// Walk `root` and read every publishable file, sorted by site path.
///
/// Hidden files and directories are skipped, except `.well-known`.
pub fn scan_directory(root: &Path) -> Result<Vec<FileRecord>, GroupingError> {
    if !root.exists() {
        return Err(GroupingError::PathNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(GroupingError::NotADirectory(root.to_path_buf()));
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| GroupingError::Read {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let data = fs::read(entry.path()).map_err(|e| GroupingError::Read {
            path: entry.path().to_path_buf(),
            reason: e.to_string(),
        })?;
        let site_path = site_path(root, entry.path())?;
        debug!(path = %site_path, size = data.len(), "Found file");
        files.push(FileRecord::new(site_path, data));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') && name != WELL_KNOWN_DIR
}

fn site_path(root: &Path, path: &Path) -> Result<String, GroupingError> {
    let relative = path.strip_prefix(root).map_err(|e| GroupingError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(format!("/{}", segments.join("/")))
}

/// Partition `files` into blob groups.
///
/// Reserved files come first as singletons, in [`RESERVED_PATHS`] order;
/// the rest keep their input order. A `max_blob_size` of `0` gives every
/// non-empty file its own group.
pub fn group_files(files: Vec<FileRecord>, max_blob_size: u64) -> Vec<BlobGroup> {
    let (mut reserved, ordinary): (Vec<FileRecord>, Vec<FileRecord>) =
        files.into_iter().partition(FileRecord::is_reserved);
    reserved.sort_by_key(|file| RESERVED_PATHS.iter().position(|p| *p == file.path));

    let mut groups = Vec::new();
    for file in reserved {
        let mut group = BlobGroup::new(groups.len());
        group.push(file);
        groups.push(group);
    }

    let mut current = BlobGroup::new(groups.len());
    for file in ordinary {
        if !current.files.is_empty() && current.size + file.size > max_blob_size {
            let next = BlobGroup::new(current.group_id + 1);
            groups.push(std::mem::replace(&mut current, next));
        }
        current.push(file);
    }
    if !current.files.is_empty() {
        groups.push(current);
    }

    groups
}

/// Scan `root` and group its files.
pub fn group_directory(root: &Path, max_blob_size: u64) -> Result<Vec<BlobGroup>, GroupingError> {
    let groups = group_files(scan_directory(root)?, max_blob_size);

    for group in &groups {
        info!(group = group.group_id, size = group.size, files = group.files.len(), "Group");
        for file in &group.files {
            debug!(group = group.group_id, path = %file.path, size = file.size, "Grouped file");
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(path: &str, size: usize) -> FileRecord {
        FileRecord::new(path, vec![b'x'; size])
    }

    #[test]
    fn test_group_files_respects_max_size() {
        let files = vec![
            record("/a", 40),
            record("/b", 50),
            record("/c", 20),
            record("/d", 100),
        ];
        let groups = group_files(files, 100);

        let paths: Vec<Vec<&str>> = groups
            .iter()
            .map(|g| g.files.iter().map(|f| f.path.as_str()).collect())
            .collect();
        assert_eq!(paths, vec![vec!["/a", "/b"], vec!["/c"], vec!["/d"]]);
        assert_eq!(groups[0].size, 90);
        assert_eq!(
            groups.iter().map(|g| g.group_id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_oversized_file_gets_own_group() {
        let groups = group_files(vec![record("/a", 10), record("/big", 500), record("/b", 10)], 100);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1].files[0].path, "/big");
    }

    #[test]
    fn test_zero_max_size_separates_files() {
        let groups = group_files(vec![record("/a", 1), record("/b", 2), record("/c", 3)], 0);
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| !g.is_packed()));
    }

    #[test]
    fn test_reserved_files_come_first_as_singletons() {
        let files = vec![
            record("/a.html", 1),
            record(PROVENANCE_PATH, 1),
            record("/b.css", 1),
            record(MANIFEST_PATH, 1),
        ];
        let groups = group_files(files, 1_000);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].files[0].path, MANIFEST_PATH);
        assert_eq!(groups[1].files[0].path, PROVENANCE_PATH);
        assert_eq!(groups[2].group_id, 2);
        assert_eq!(groups[2].files.len(), 2);
    }

    #[test]
    fn test_payload_marker_only_when_packed() {
        let single = group_files(vec![record("/a", 3)], 100);
        assert_eq!(single[0].payload(), b"xxx".to_vec());

        let packed = group_files(vec![record("/a", 1), record("/b", 2)], 100);
        assert_eq!(packed[0].payload(), vec![MULTI_FILE_MARKER, b'x', b'x', b'x']);
    }

    #[test]
    fn test_scan_directory_walks_sorted_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::create_dir_all(dir.path().join(".well-known")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("assets").join("app.js"), "console.log(1)").unwrap();
        fs::write(dir.path().join(".well-known").join("site_manifest.json"), "{}").unwrap();
        fs::write(dir.path().join(".git").join("HEAD"), "ref").unwrap();
        fs::write(dir.path().join(".env"), "SECRET=1").unwrap();

        let files = scan_directory(dir.path()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec![MANIFEST_PATH, "/assets/app.js", "/index.html"]);

        let index = &files[2];
        assert_eq!(index.content_type, "text/html");
        assert_eq!(index.content_encoding, "identity");
        assert_eq!(index.size, 13);
        assert_eq!(index.hash, ContentHash::digest(b"<html></html>"));
    }

    #[test]
    fn test_scan_missing_directory_fails_fast() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("dist");
        assert!(matches!(
            scan_directory(&missing),
            Err(GroupingError::PathNotFound(_))
        ));
    }
}
