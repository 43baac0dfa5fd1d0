//! Lexical POSIX path helpers.
//!
//! Store paths are plain `/`-separated strings whatever the host OS is, so
//! these helpers never touch `std::path`. Nothing here consults a store:
//! `..` is collapsed textually and clamped at the root.

/// Collapse `.`, `..` and repeated slashes into an absolute path.
///
/// `..` at the root stays at the root.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    let mut out = String::with_capacity(path.len() + 1);
    for part in &parts {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Join two posix paths the way `pathlib` does: an absolute `child`
/// replaces `base`, an empty side yields the other one.
pub fn join(base: &str, child: &str) -> String {
    if child.starts_with('/') || base.is_empty() {
        return child.to_string();
    }
    if child.is_empty() {
        return base.to_string();
    }
    let mut out = String::with_capacity(base.len() + child.len() + 1);
    out.push_str(base);
    if !base.ends_with('/') {
        out.push('/');
    }
    out.push_str(child);
    out
}

/// Final component of a path, or `""` for a root.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Everything before the final component.
///
/// Returns `None` for roots and for single relative components.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&trimmed[..idx]),
        None => None,
    }
}

/// Returns `true` if `path` equals `base` or lies underneath it.
///
/// Both arguments must already be normalized.
pub fn is_within(path: &str, base: &str) -> bool {
    if base == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
