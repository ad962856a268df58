use std::path::PathBuf;

/// Expands a leading `~` or `~/` to `$HOME`. Anything else, or an unset
/// `HOME`, leaves the path as written.
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => None,
        Some(rest) => match rest.strip_prefix('/') {
            Some(rest) => Some(rest),
            None => return PathBuf::from(path),
        },
        None => return PathBuf::from(path),
    };

    match (std::env::var_os("HOME"), rest) {
        (Some(home), Some(rest)) => PathBuf::from(home).join(rest),
        (Some(home), None) => PathBuf::from(home),
        (None, _) => PathBuf::from(path),
    }
}
