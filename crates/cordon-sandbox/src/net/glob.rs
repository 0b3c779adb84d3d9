//! Hostname glob matching.
//!
//! Wildcard semantics here differ from the filesystem matcher on purpose: in
//! a generic pattern, `*` compiles to `.*` and therefore spans dot-separated
//! labels, whereas the filesystem `*` stops at `/`. The dedicated forms are
//! stricter: `*.base` matches only proper subdomains of `base`, and
//! `**.base` additionally matches `base` itself.

use regex::Regex;

/// Match a hostname against a domain pattern, case-insensitively.
///
/// Evaluation order:
/// 1. exact equality;
/// 2. `*` or `**` alone match every domain;
/// 3. `**.base` matches `base` and anything ending in `.base`;
/// 4. `*.base` matches strict subdomains only; `base` itself does NOT match;
/// 5. `base.*` matches any domain starting with `base`;
/// 6. any other pattern containing `*` compiles to an anchored regex with
///    `.` escaped and `*` → `.*` (crossing labels);
/// 7. everything else does not match.
pub fn match_domain_pattern(domain: &str, pattern: &str) -> bool {
    let domain = domain.to_lowercase();
    let pattern = pattern.to_lowercase();

    if domain == pattern {
        return true;
    }

    if pattern == "*" || pattern == "**" {
        return true;
    }

    if let Some(base) = pattern.strip_prefix("**.") {
        return domain == base || domain.ends_with(&format!(".{base}"));
    }

    if let Some(base) = pattern.strip_prefix("*.") {
        return domain.ends_with(&format!(".{base}"));
    }

    if let Some(base) = pattern.strip_suffix(".*") {
        return domain.starts_with(base);
    }

    if pattern.contains('*') {
        return match domain_glob_to_regex(&pattern) {
            Ok(regex) => regex.is_match(&domain),
            // Fail closed on an uncompilable pattern.
            Err(_) => false,
        };
    }

    false
}

/// Compile a domain glob into an anchored regex where `*` spans labels.
fn domain_glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            ch if ch.is_ascii_alphanumeric() || ch == '-' => source.push(ch),
            ch => source.push_str(&regex::escape(&ch.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source)
}
