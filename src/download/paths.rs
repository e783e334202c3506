use std::path::{PathBuf, MAIN_SEPARATOR};

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Normalize a destination directory so it always ends with a separator.
///
/// The normalized string is part of a record's identity, so `mods` and
/// `mods/` must map to the same record.
pub fn normalize_destination(path: &str) -> String {
    let mut normalized = expand_tilde(path).to_string_lossy().into_owned();
    if !normalized.ends_with('/') && !normalized.ends_with(MAIN_SEPARATOR) {
        normalized.push(MAIN_SEPARATOR);
    }
    normalized
}
