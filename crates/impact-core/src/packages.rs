//! Package list loading.

use std::path::Path;

use crate::error::{ImpactError, Result};

/// Parse a newline-delimited package list.
///
/// Lines are trimmed; blank lines and `#` comments are skipped.
pub fn parse_package_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load the package list at `path`.
pub fn load_package_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|source| ImpactError::PackageList {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_package_list(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_skips() {
        let content = "  github.com/a/one  \n\n# disabled\ngithub.com/b/two\r\n   \n";
        let packages = parse_package_list(content);
        assert_eq!(packages, vec!["github.com/a/one", "github.com/b/two"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_package_list(Path::new("/no/such/packages.txt")).unwrap_err();
        assert!(matches!(err, ImpactError::PackageList { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packages.txt");
        std::fs::write(&path, "x\ny\n").unwrap();
        assert_eq!(load_package_list(&path).unwrap(), vec!["x", "y"]);
    }
}
