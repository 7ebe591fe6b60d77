//! Directory tree snapshots for assertions.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Read every regular file below `root` into a map of `/relative/path` to
/// contents, in the same shape as `MemorySink::dump`.
///
/// A missing root reads as an empty tree.
pub fn read_dir_tree(root: &Path) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    if root.exists() {
        collect(root, "", &mut files);
    }
    files
}

fn collect(dir: &Path, prefix: &str, files: &mut BTreeMap<String, String>) {
    // Entries can vanish mid-walk while a mirror is renaming temp files
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => panic!("read_dir_tree: unreadable directory {}: {}", dir.display(), e),
    };
    for entry in entries {
        let entry = entry.expect("read_dir_tree: unreadable entry");
        let name = entry.file_name().to_string_lossy().into_owned();
        let relative = format!("{}/{}", prefix, name);
        let path = entry.path();
        if path.is_dir() {
            collect(&path, &relative, files);
            continue;
        }
        match fs::read(&path) {
            Ok(contents) => {
                files.insert(relative, String::from_utf8_lossy(&contents).into_owned());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => panic!("read_dir_tree: unreadable file {}: {}", path.display(), e),
        }
    }
}
