//! Maps remote object keys to local file paths.

use std::path::{Component, Path, PathBuf};

/// Remove `prefix` from the front of `name` when present; otherwise return
/// `name` unchanged.
pub fn strip_prefix<'a>(name: &'a str, prefix: &str) -> &'a str {
    name.strip_prefix(prefix).unwrap_or(name)
}

/// Local destination for object `name`: `output_dir` joined with the key
/// relative to `prefix`, with `.` segments and repeated separators removed.
pub fn map_path(name: &str, prefix: &str, output_dir: &Path) -> PathBuf {
    let relative: PathBuf = Path::new(strip_prefix(name, prefix))
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    output_dir.join(relative)
}

/// True when the key relative to `prefix` stays beneath the output directory.
///
/// Rejects remainders that name no file (empty or only `.`), absolute paths
/// and any `..` component. Such keys are refused rather than rewritten.
pub fn is_contained(name: &str, prefix: &str) -> bool {
    let relative = Path::new(strip_prefix(name, prefix));
    relative
        .components()
        .any(|component| matches!(component, Component::Normal(_)))
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_only_when_present() {
        assert_eq!(strip_prefix("prefix/foo", "prefix/"), "foo");
        assert_eq!(strip_prefix("other/foo", "prefix/"), "other/foo");
        assert_eq!(strip_prefix("foo", ""), "foo");
    }

    #[test]
    fn maps_nested_keys_under_output_dir() {
        let out = Path::new("path");
        assert_eq!(map_path("prefix/foo", "prefix/", out), Path::new("path/foo"));
        assert_eq!(
            map_path("prefix/baz/qux", "prefix/", out),
            Path::new("path/baz/qux")
        );
        assert_eq!(map_path("elsewhere/x", "prefix/", out), Path::new("path/elsewhere/x"));
    }

    #[test]
    fn mapped_paths_are_cleaned() {
        let out = Path::new("path");
        let cleaned = map_path("prefix/./foo", "prefix/", out);
        assert_eq!(cleaned, Path::new("path/foo"));
        assert_eq!(cleaned.display().to_string(), "path/foo");
        assert_eq!(
            map_path("prefix/a//b", "prefix/", out).display().to_string(),
            "path/a/b"
        );
        assert_eq!(
            map_path("./lead/x", "", out).display().to_string(),
            "path/lead/x"
        );
    }

    #[test]
    fn mapping_is_repeatable() {
        let out = Path::new("/tmp/out");
        assert_eq!(
            map_path("a/b/c", "a/", out),
            map_path("a/b/c", "a/", out)
        );
    }

    #[test]
    fn rejects_keys_that_escape_the_output_dir() {
        assert!(is_contained("prefix/foo", "prefix/"));
        assert!(is_contained("prefix/./foo", "prefix/"));
        assert!(!is_contained("prefix/../escape", "prefix/"));
        assert!(!is_contained("../escape", ""));
        assert!(!is_contained("prefix//etc/passwd", "prefix/"));
        assert!(!is_contained("prefix/", "prefix/"));
        assert!(!is_contained("prefix/.", "prefix/"));
        assert!(is_contained("prefix/a//b", "prefix/"));
    }
}
