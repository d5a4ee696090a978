//! Early rejection of files that should never be relocated.
//!
//! Browsers, office suites and editors drop partial or lock files next to
//! the real thing. Those are recognised purely by name.

use crate::watched::WatchedPath;

/// Name prefixes of temp, lock and filesystem marker files.
const TRANSIENT_PREFIXES: &[&str] = &["~$", "temp_", "tmp_", ".DS_Store"];

/// Name fragments of partial downloads and editor backups.
const TRANSIENT_FRAGMENTS: &[&str] = &["~", ".tmp", ".temp", ".crdownload", ".part"];

/// Other filesystem marker files that show up in watched folders.
const MARKER_FILES: &[&str] = &["Thumbs.db", "desktop.ini", ".localized"];

/// Checks whether a file name looks like a transient or marker file.
pub fn is_transient(file_name: &str) -> bool {
    TRANSIENT_PREFIXES.iter().any(|p| file_name.starts_with(p))
        || TRANSIENT_FRAGMENTS.iter().any(|f| file_name.contains(f))
        || MARKER_FILES.iter().any(|m| file_name.eq_ignore_ascii_case(m))
}

/// Checks whether the file's extension is on the ignore list.
///
/// `ignored` must already be lower-cased. Files without an extension are
/// never ignored by this rule.
pub fn is_ignored(path: &WatchedPath, ignored: &[String]) -> bool {
    match path.extension_key() {
        Some(ext) => ignored.iter().any(|i| *i == ext),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_prefixes() {
        assert!(is_transient("~$budget.xlsx"));
        assert!(is_transient("temp_upload.bin"));
        assert!(is_transient("tmp_1234"));
        assert!(is_transient(".DS_Store"));
    }

    #[test]
    fn test_transient_fragments() {
        assert!(is_transient("movie.mp4.crdownload"));
        assert!(is_transient("iso.part"));
        assert!(is_transient("notes.txt~"));
        assert!(is_transient("data.tmp"));
        assert!(is_transient("archive.temp.zip"));
    }

    #[test]
    fn test_marker_files() {
        assert!(is_transient("Thumbs.db"));
        assert!(is_transient("desktop.ini"));
    }

    #[test]
    fn test_regular_names_pass() {
        assert!(!is_transient("report.pdf"));
        assert!(!is_transient("holiday photo.jpg"));
        assert!(!is_transient("template.docx"));
    }

    #[test]
    fn test_ignore_list_is_case_insensitive() {
        let ignored = vec!["tmp".to_string(), "log".to_string()];
        assert!(is_ignored(&WatchedPath::new("/w/x.tmp").unwrap(), &ignored));
        assert!(is_ignored(&WatchedPath::new("/w/SERVER.LOG").unwrap(), &ignored));
        assert!(!is_ignored(&WatchedPath::new("/w/x.pdf").unwrap(), &ignored));
        assert!(!is_ignored(&WatchedPath::new("/w/README").unwrap(), &ignored));
    }
}
