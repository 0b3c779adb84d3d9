//! Path glob matching.
//!
//! Wildcard semantics here are separator-aware: `*` and `?` never cross a
//! `/`, while `**` matches anything including separators. This is
//! deliberately different from the domain matcher in [`crate::net::glob`],
//! where a bare `*` spans dot-separated labels; the two matchers are
//! separate contracts, not one shared translator.

use regex::Regex;
use std::path::{Component, Path, PathBuf};

/// Normalize a path to an absolute, lexically-cleaned form.
///
/// Relative paths are joined onto the current working directory. `.` and
/// `..` components are resolved without touching the filesystem; symbolic
/// links are NOT followed (link-aware decisions belong to the OS-level
/// process sandbox). Returns `None` when normalization fails, e.g. when a
/// `..` would climb past the root. Callers treat that as a denial.
pub fn normalize_path(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
                // Popping back to nothing means `..` escaped the root.
                if normalized.as_os_str().is_empty() {
                    return None;
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }

    Some(normalized)
}

/// Check whether `child` lies strictly inside `parent`.
///
/// True iff the relative path from `parent` to `child` is non-empty, does
/// not start with `..`, and is not absolute. A path is not inside itself.
pub fn is_path_inside(child: &Path, parent: &Path) -> bool {
    match child.strip_prefix(parent) {
        Ok(relative) => !relative.as_os_str().is_empty(),
        Err(_) => false,
    }
}

/// Match a normalized path against a glob pattern.
///
/// Evaluation order:
/// 1. exact string equality;
/// 2. a pattern ending in `/*` matches only direct children of the prefix;
/// 3. a pattern containing `**`, `*`, or `?` is compiled to an anchored
///    regex (`**` crosses separators, `*` and `?` stop at them);
/// 4. anything else is treated as a directory prefix: the path matches when
///    it lies inside the pattern path.
pub fn match_path_pattern(path: &str, pattern: &str, case_sensitive: bool) -> bool {
    let (path, pattern) = if case_sensitive {
        (path.to_string(), pattern.to_string())
    } else {
        (path.to_lowercase(), pattern.to_lowercase())
    };

    if path == pattern {
        return true;
    }

    if let Some(prefix) = pattern.strip_suffix("/*") {
        return is_direct_child(Path::new(&path), Path::new(prefix));
    }

    if pattern.contains(['*', '?']) {
        return match glob_to_regex(&pattern) {
            Ok(regex) => regex.is_match(&path),
            // Fail closed on an uncompilable pattern.
            Err(_) => false,
        };
    }

    is_path_inside(Path::new(&path), Path::new(&pattern))
}

/// True when `path` is a direct child of `parent` (exactly one component deeper).
fn is_direct_child(path: &Path, parent: &Path) -> bool {
    match path.strip_prefix(parent) {
        Ok(relative) => relative.components().count() == 1,
        Err(_) => false,
    }
}

/// Compile a path glob into an anchored regex.
///
/// Every regex metacharacter is escaped except `*` and `?`; `**` becomes
/// match-anything, `*` match-anything-except-separator, `?` one
/// non-separator character.
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    source.push_str(".*");
                } else {
                    source.push_str("[^/]*");
                }
            }
            '?' => source.push_str("[^/]"),
            ch if ch.is_ascii_alphanumeric() || ch == '/' || ch == '_' || ch == '-' => {
                source.push(ch)
            }
            ch => {
                source.push_str(&regex::escape(&ch.to_string()));
            }
        }
    }

    source.push('$');
    Regex::new(&source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_absolute() {
        let normalized = normalize_path(Path::new("/home/user/../user/./projects")).unwrap();
        assert_eq!(normalized, PathBuf::from("/home/user/projects"));
    }

    #[test]
    fn test_normalize_escaping_root_fails() {
        assert!(normalize_path(Path::new("/..")).is_none());
        assert!(normalize_path(Path::new("/../etc/passwd")).is_none());
    }

    #[test]
    fn test_normalize_relative_becomes_absolute() {
        let normalized = normalize_path(Path::new("some/file.txt")).unwrap();
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("some/file.txt"));
    }

    #[test]
    fn test_is_path_inside() {
        assert!(is_path_inside(
            Path::new("/home/user/projects/file.txt"),
            Path::new("/home/user/projects"),
        ));
        assert!(!is_path_inside(
            Path::new("/etc/passwd"),
            Path::new("/home/user"),
        ));
        // A path is not inside itself.
        assert!(!is_path_inside(Path::new("/work"), Path::new("/work")));
        // Sibling with a shared string prefix is not inside.
        assert!(!is_path_inside(
            Path::new("/home/username"),
            Path::new("/home/user"),
        ));
    }

    #[test]
    fn test_exact_match() {
        assert!(match_path_pattern("/etc/shadow", "/etc/shadow", true));
        assert!(!match_path_pattern("/etc/shadow2", "/etc/shadow", true));
    }

    #[test]
    fn test_direct_child_pattern() {
        assert!(match_path_pattern("/work/a.txt", "/work/*", true));
        assert!(!match_path_pattern("/work/sub/a.txt", "/work/*", true));
        assert!(!match_path_pattern("/work", "/work/*", true));
    }

    #[test]
    fn test_double_star_crosses_separators() {
        assert!(match_path_pattern("/work/sub/deep/a.txt", "/work/**", true));
        assert!(match_path_pattern("/work/a.txt", "/work/**", true));
        assert!(!match_path_pattern("/other/a.txt", "/work/**", true));
    }

    #[test]
    fn test_single_star_stops_at_separator() {
        assert!(match_path_pattern("/logs/app.log", "/logs/*.log", true));
        assert!(!match_path_pattern("/logs/sub/app.log", "/logs/*.log", true));
    }

    #[test]
    fn test_question_mark() {
        assert!(match_path_pattern("/data/a1", "/data/a?", true));
        assert!(!match_path_pattern("/data/a/", "/data/a?", true));
        assert!(!match_path_pattern("/data/abc", "/data/a?", true));
    }

    #[test]
    fn test_prefix_fallback() {
        assert!(match_path_pattern(
            "/home/user/.ssh/id_rsa",
            "/home/user/.ssh",
            true
        ));
        assert!(!match_path_pattern("/home/user/.sshx", "/home/user/.ssh", true));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(match_path_pattern("/Work/A.TXT", "/work/*.txt", false));
        assert!(!match_path_pattern("/Work/A.TXT", "/work/*.txt", true));
    }

    #[test]
    fn test_regex_metacharacters_escaped() {
        assert!(match_path_pattern("/data/a.b", "/data/a.b", true));
        // The dot must not act as a regex wildcard.
        assert!(!match_path_pattern("/data/axb", "/data/a.b/*", true));
        assert!(match_path_pattern("/data/v1+2/x", "/data/v1+2/*", true));
    }
}
