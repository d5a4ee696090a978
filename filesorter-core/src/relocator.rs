//! Collision-safe relocation into category directories.
//!
//! The destination name is resolved and the move performed while holding a
//! lock for the target directory, so two files racing for `report.pdf`
//! end up as `report.pdf` and `report (1).pdf`. Moves into different
//! directories don't contend.

use crate::error::{Result, SorterError};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Moves files into `root/<category>/` without overwriting anything.
#[derive(Debug)]
pub struct Relocator {
    root: PathBuf,
    dir_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl Relocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The destination root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a category maps to. Not created until first use.
    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.root.join(category_component(category))
    }

    /// Moves `source` into the category directory under `file_name`,
    /// numbering the stem if that name is taken.
    ///
    /// Returns the final destination. On error the source is left where
    /// it was.
    pub fn relocate(&self, source: &Path, category: &str, file_name: &str) -> Result<PathBuf> {
        let dir = self.category_dir(category);
        let lock = self.lock_for(&dir);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if fs::symlink_metadata(source).is_err() {
            return Err(SorterError::SourceMissing(source.to_path_buf()));
        }

        // create_dir_all is a no-op when another run already made it.
        fs::create_dir_all(&dir).map_err(|e| SorterError::io(&dir, e))?;

        let destination = free_destination(&dir, file_name);
        move_file(source, &destination)?;

        info!("Moved {} -> {}", source.display(), destination.display());
        Ok(destination)
    }

    fn lock_for(&self, dir: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.dir_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(dir.to_path_buf()).or_default())
    }
}

/// Turns a category label into a single safe path component.
fn category_component(category: &str) -> String {
    let cleaned: String = category
        .chars()
        .filter(|c| !matches!(c, '/' | '\\') && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        crate::classifier::UNKNOWN_CATEGORY.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Finds the first name in `dir` that doesn't exist yet:
/// `name.ext`, then `name (1).ext`, `name (2).ext`, ...
///
/// Checked fresh on every call; callers serialize per directory.
pub fn free_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !occupied(&candidate) {
        return candidate;
    }

    let (stem, extension) = split_name(file_name);
    let mut counter: u64 = 1;
    loop {
        let candidate = dir.join(format!("{} ({}){}", stem, counter, extension));
        if !occupied(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Dangling symlinks count as taken, so `symlink_metadata` instead of `exists`.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Splits `name.ext` into stem and extension, keeping the dot on the
/// extension. Leading dots belong to the stem, so `.profile` has no
/// extension, and a trailing dot is an extension of its own (`odd.` numbers
/// as `odd (1).`).
fn split_name(file_name: &str) -> (&str, &str) {
    let leading = file_name.len() - file_name.trim_start_matches('.').len();
    match file_name.rfind('.') {
        Some(idx) if idx > leading => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    if fs::symlink_metadata(from).is_err() {
        return Err(SorterError::SourceMissing(from.to_path_buf()));
    }

    // Typically a cross-device move. Copy, then drop the original.
    debug!(
        "Rename {} -> {} failed ({}), trying copy",
        from.display(),
        to.display(),
        rename_err
    );
    copy_then_remove(from, to).map_err(|source| SorterError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    let result = fs::copy(from, to).and_then(|_| fs::remove_file(from));
    if result.is_err() && occupied(to) {
        if let Err(e) = fs::remove_file(to) {
            warn!("Failed to clean up partial copy {}: {}", to.display(), e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("report.pdf"), ("report", ".pdf"));
        assert_eq!(split_name("a.tar.gz"), ("a.tar", ".gz"));
        assert_eq!(split_name(".profile"), (".profile", ""));
        assert_eq!(split_name("..hidden.txt"), ("..hidden", ".txt"));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name("odd."), ("odd", "."));
    }

    #[test]
    fn test_free_destination_numbers_collisions() {
        let dir = tempdir().unwrap();
        assert_eq!(
            free_destination(dir.path(), "report.pdf"),
            dir.path().join("report.pdf")
        );

        fs::write(dir.path().join("report.pdf"), "a").unwrap();
        fs::write(dir.path().join("report (1).pdf"), "b").unwrap();
        assert_eq!(
            free_destination(dir.path(), "report.pdf"),
            dir.path().join("report (2).pdf")
        );

        fs::write(dir.path().join("notes"), "c").unwrap();
        assert_eq!(
            free_destination(dir.path(), "notes"),
            dir.path().join("notes (1)")
        );

        fs::write(dir.path().join("odd."), "d").unwrap();
        assert_eq!(
            free_destination(dir.path(), "odd."),
            dir.path().join("odd (1).")
        );
    }

    #[test]
    fn test_relocate_creates_category_dir() {
        let watch = tempdir().unwrap();
        let db = tempdir().unwrap();
        let source = watch.path().join("report.pdf");
        fs::write(&source, "pdf bytes").unwrap();

        let relocator = Relocator::new(db.path());
        let dest = relocator.relocate(&source, "DOCUMENTS", "report.pdf").unwrap();

        assert_eq!(dest, db.path().join("DOCUMENTS").join("report.pdf"));
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "pdf bytes");
    }

    #[test]
    fn test_relocate_never_overwrites() {
        let watch = tempdir().unwrap();
        let db = tempdir().unwrap();
        let relocator = Relocator::new(db.path());

        let existing = db.path().join("DOCUMENTS").join("report.pdf");
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        fs::write(&existing, "original").unwrap();

        let source = watch.path().join("report.pdf");
        fs::write(&source, "newcomer").unwrap();
        let dest = relocator.relocate(&source, "DOCUMENTS", "report.pdf").unwrap();

        assert_eq!(dest, db.path().join("DOCUMENTS").join("report (1).pdf"));
        assert_eq!(fs::read_to_string(&existing).unwrap(), "original");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "newcomer");
    }

    #[test]
    fn test_relocate_missing_source() {
        let db = tempdir().unwrap();
        let relocator = Relocator::new(db.path());
        let err = relocator
            .relocate(&db.path().join("ghost.pdf"), "DOCUMENTS", "ghost.pdf")
            .unwrap_err();
        assert!(matches!(err, SorterError::SourceMissing(_)));
        assert!(!db.path().join("DOCUMENTS").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_move_leaves_source() {
        use std::os::unix::fs::PermissionsExt;

        let watch = tempdir().unwrap();
        let db = tempdir().unwrap();
        let source = watch.path().join("keep.txt");
        fs::write(&source, "still here").unwrap();

        let target = db.path().join("TEXT");
        fs::create_dir_all(&target).unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o500)).unwrap();

        // Root ignores directory permissions; nothing to assert there.
        if fs::write(target.join("probe"), "").is_ok() {
            fs::set_permissions(&target, fs::Permissions::from_mode(0o700)).unwrap();
            return;
        }

        let relocator = Relocator::new(db.path());
        let result = relocator.relocate(&source, "TEXT", "keep.txt");
        fs::set_permissions(&target, fs::Permissions::from_mode(0o700)).unwrap();

        assert!(matches!(result, Err(SorterError::Move { .. })));
        assert_eq!(fs::read_to_string(&source).unwrap(), "still here");
    }

    #[test]
    fn test_category_is_single_component() {
        let relocator = Relocator::new("/db");
        assert_eq!(relocator.category_dir("../etc"), PathBuf::from("/db/..etc"));
        assert_eq!(relocator.category_dir(".."), PathBuf::from("/db/UNKNOWN"));
        assert_eq!(relocator.category_dir("IMAGES"), PathBuf::from("/db/IMAGES"));
    }

    #[test]
    fn test_concurrent_same_name_all_distinct() {
        let watch = tempdir().unwrap();
        let db = tempdir().unwrap();
        let relocator = Arc::new(Relocator::new(db.path()));
        let count = 8;

        let handles: Vec<_> = (0..count)
            .map(|i| {
                let sub = watch.path().join(format!("src{}", i));
                fs::create_dir_all(&sub).unwrap();
                let source = sub.join("report.pdf");
                fs::write(&source, format!("copy {}", i)).unwrap();
                let relocator = Arc::clone(&relocator);
                thread::spawn(move || {
                    relocator
                        .relocate(&source, "DOCUMENTS", "report.pdf")
                        .unwrap()
                })
            })
            .collect();

        let dests: HashSet<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(dests.len(), count);

        let category = db.path().join("DOCUMENTS");
        assert!(dests.contains(&category.join("report.pdf")));
        for n in 1..count {
            assert!(dests.contains(&category.join(format!("report ({}).pdf", n))));
        }

        let contents: HashSet<String> = dests
            .iter()
            .map(|d| fs::read_to_string(d).unwrap())
            .collect();
        assert_eq!(contents.len(), count);
    }
}
