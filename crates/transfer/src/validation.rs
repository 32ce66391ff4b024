use std::path::{Component, Path};

use mission_protocol::constants::DEFAULT_FILENAME;

/// Reduces a declared filename to a bare basename safe to join onto the
/// destination directory.
///
/// Directory components are stripped (both `/` and `\` count as
/// separators regardless of platform). Names that end up empty, `.`, `..`,
/// containing NUL, or not a single plain path component are replaced by
/// [`DEFAULT_FILENAME`].
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return DEFAULT_FILENAME.to_string();
    }

    // Catches drive prefixes and anything else the platform would not treat
    // as one plain name.
    let mut components = Path::new(base).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => base.to_string(),
        _ => DEFAULT_FILENAME.to_string(),
    }
}
