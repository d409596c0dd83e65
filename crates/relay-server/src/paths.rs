//! Filesystem locations.

use std::path::PathBuf;

/// Sessions directory under the home directory when none is given.
pub const DEFAULT_SESSIONS_DIR: &str = ".relay/sessions";

/// Resolves the sessions root, expanding `~` and environment variables.
pub fn sessions_dir(configured: Option<&str>) -> PathBuf {
    match configured.map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => PathBuf::from(shellexpand::full(path).map_or_else(
            |_| shellexpand::tilde(path).into_owned(),
            |expanded| expanded.into_owned(),
        )),
        None => dirs::home_dir()
            .map(|h| h.join(DEFAULT_SESSIONS_DIR))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSIONS_DIR)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_kept() {
        assert_eq!(sessions_dir(Some("/var/lib/relay")), PathBuf::from("/var/lib/relay"));
    }

    #[test]
    fn test_tilde_expanded() {
        let path = sessions_dir(Some("~/relay"));
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("relay"));
    }

    #[test]
    fn test_default_under_home() {
        assert!(sessions_dir(None).ends_with(DEFAULT_SESSIONS_DIR));
        assert_eq!(sessions_dir(Some("  ")), sessions_dir(None));
    }
}
