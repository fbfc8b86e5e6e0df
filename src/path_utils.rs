// src/path_utils.rs

//! Path comparison helpers shared by config validation, the copy filter and
//! artifact layout.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Absolute, normalised form of `path` suitable for comparisons.
///
/// The longest existing ancestor is canonicalized (resolving symlinks and
/// `..`); components below it that do not exist yet are appended as-is.
/// Falls back to a purely lexical form when nothing can be resolved.
pub fn comparable(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let normal = normalize_lexically(&absolute);

    let mut missing: Vec<OsString> = Vec::new();
    let mut cursor = normal.as_path();
    loop {
        if let Ok(mut resolved) = cursor.canonicalize() {
            for name in missing.iter().rev() {
                resolved.push(name);
            }
            return resolved;
        }
        match (cursor.parent(), cursor.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                cursor = parent;
            }
            _ => return normal,
        }
    }
}

/// Drop `.` components and fold `..` into the preceding component without
/// touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// True when `a` and `b` name the same location.
pub fn same_path(a: &Path, b: &Path) -> bool {
    comparable(a) == comparable(b)
}

/// True when `path` is `ancestor` or lies below it.
pub fn is_within(path: &Path, ancestor: &Path) -> bool {
    comparable(path).starts_with(comparable(ancestor))
}

/// `path` relative to `root`, comparing resolved forms. `None` when `path`
/// is not below `root` (or is `root` itself).
pub fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    let root = comparable(root);
    let path = comparable(path);
    match path.strip_prefix(&root) {
        Ok(rel) if !rel.as_os_str().is_empty() => Some(rel.to_path_buf()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn lexical_normalisation_folds_dots() {
        assert_eq!(normalize_lexically(Path::new("./a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize_lexically(Path::new("/a/../..")), PathBuf::from("/"));
        assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize_lexically(Path::new("./.")), PathBuf::from("."));
    }

    #[test]
    fn same_path_sees_through_dots_and_missing_tails() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        assert!(same_path(&root.join("./."), root));
        assert!(same_path(&root.join("./backups/job"), &root.join("backups/job")));
        assert!(!same_path(&root.join("backups"), root));
    }

    #[test]
    fn within_and_relative() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("server");
        fs::create_dir_all(&root).unwrap();

        assert!(is_within(&root.join("."), &root));
        assert!(is_within(&root.join("staging/job"), &root));
        assert!(!is_within(&root, &root.join("backups")));
        assert!(is_within(&root, &root.join("..")));

        assert_eq!(
            relative_to(&root.join("."), &root.join("staging")),
            Some(PathBuf::from("staging"))
        );
        assert_eq!(relative_to(&root, &root), None);
        assert_eq!(relative_to(&root, dir.path()), None);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_roots_compare_equal() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir_all(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(same_path(&link.join("temp"), &real.join("temp")));
        assert_eq!(relative_to(&link, &real.join("temp")), Some(PathBuf::from("temp")));
    }
}
