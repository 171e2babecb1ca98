//! Helpers for turning scene names into file names.

/// Returns true if a name is safe to use as a single path component on all platforms.
///
/// Rules:
/// - Must be non-empty and not "." or ".."
/// - Must not contain path separators ('/' or '\\')
/// - Must not contain control characters or NUL
/// - Must not contain Windows-reserved filename characters
/// - Must not end with '.' or space (Windows restriction)
pub fn is_safe_file_stem(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }

    if name.ends_with('.') || name.ends_with(' ') {
        return false;
    }

    name.chars().all(is_safe_char)
}

/// Make a scene name usable as a file stem.
///
/// Safe names are returned unchanged. Otherwise every offending character is
/// replaced with `_` and trailing dots/spaces are trimmed; an empty result
/// becomes `"unnamed"`.
pub fn sanitize_file_stem(name: &str) -> String {
    if is_safe_file_stem(name) {
        return name.to_string();
    }

    let replaced: String = name
        .chars()
        .map(|c| if is_safe_char(c) { c } else { '_' })
        .collect();
    let trimmed = replaced.trim_end_matches(['.', ' ']);

    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_safe_char(c: char) -> bool {
    if c == '/' || c == '\\' || c == '\0' || c.is_control() {
        return false;
    }
    // Windows-reserved filename characters.
    !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

#[cfg(test)]
mod tests {
    use super::{is_safe_file_stem, sanitize_file_stem};

    #[test]
    fn accepts_common_mesh_names() {
        assert!(is_safe_file_stem("Cube"));
        assert!(is_safe_file_stem("SM_Rock.001"));
        assert!(is_safe_file_stem("crate-large_02"));
        assert!(is_safe_file_stem("Tree Trunk"));
    }

    #[test]
    fn rejects_empty_and_special() {
        assert!(!is_safe_file_stem(""));
        assert!(!is_safe_file_stem("."));
        assert!(!is_safe_file_stem(".."));
        assert!(!is_safe_file_stem("props/barrel"));
        assert!(!is_safe_file_stem("bad|name"));
        assert!(!is_safe_file_stem("trailing."));
    }

    #[test]
    fn sanitize_replaces_offending_characters() {
        assert_eq!(sanitize_file_stem("Cube"), "Cube");
        assert_eq!(sanitize_file_stem("props/barrel"), "props_barrel");
        assert_eq!(sanitize_file_stem("a:b?c"), "a_b_c");
        assert_eq!(sanitize_file_stem("mesh. "), "mesh");
        assert_eq!(sanitize_file_stem(""), "unnamed");
        assert_eq!(sanitize_file_stem(".."), "unnamed");
    }
}
