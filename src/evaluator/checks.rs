use std::path::Path;

use walkdir::WalkDir;

use super::models::StaticChecks;

const CODE_EXTENSIONS: &[&str] = &["html", "css", "js", "mjs", "ts", "jsx", "tsx", "py"];

/// Inspect a checked-out tree for the files every submission should carry.
///
/// License, README and entry point are looked up at the top level only;
/// code files count anywhere below the root. `.git` is never descended into.
pub fn static_checks(root: &Path) -> StaticChecks {
    let mut checks = StaticChecks {
        has_license: false,
        has_readme: false,
        has_index_html: false,
        has_code_files: false,
    };

    let entries = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let name = entry.file_name().to_string_lossy();
        if entry.depth() == 1 {
            if name.to_ascii_uppercase().starts_with("LICENSE") {
                checks.has_license = true;
            }
            if name == "README.md" {
                checks.has_readme = true;
            }
            if name == "index.html" {
                checks.has_index_html = true;
            }
        }
        let is_code = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| CODE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_code {
            checks.has_code_files = true;
        }
    }

    checks
}

/// Top-level README contents, if present. Invalid UTF-8 is replaced, not rejected.
pub fn read_readme(root: &Path) -> Option<String> {
    let bytes = std::fs::read(root.join("README.md")).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(full, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_complete_submission() {
        let dir = tree(&[
            ("LICENSE", "MIT"),
            ("README.md", "# App"),
            ("index.html", "<h1>App</h1>"),
        ]);
        let checks = static_checks(dir.path());
        assert!(checks.has_license);
        assert!(checks.has_readme);
        assert!(checks.has_index_html);
        assert!(checks.has_code_files);
    }

    #[test]
    fn test_empty_tree() {
        let dir = tree(&[]);
        let checks = static_checks(dir.path());
        assert_eq!(
            checks,
            StaticChecks {
                has_license: false,
                has_readme: false,
                has_index_html: false,
                has_code_files: false,
            }
        );
    }

    #[test]
    fn test_license_variants_case_insensitive() {
        let dir = tree(&[("license.txt", "MIT")]);
        assert!(static_checks(dir.path()).has_license);
        let dir = tree(&[("LICENSE.md", "MIT")]);
        assert!(static_checks(dir.path()).has_license);
    }

    #[test]
    fn test_nested_entry_point_does_not_count() {
        let dir = tree(&[("site/index.html", "<h1>x</h1>"), ("docs/README.md", "x")]);
        let checks = static_checks(dir.path());
        assert!(!checks.has_index_html);
        assert!(!checks.has_readme);
        assert!(checks.has_code_files);
    }

    #[test]
    fn test_git_directory_is_ignored() {
        let dir = tree(&[(".git/hooks/pre-commit.py", "print()"), ("README.md", "# x")]);
        let checks = static_checks(dir.path());
        assert!(!checks.has_code_files);
        assert!(checks.has_readme);
    }

    #[test]
    fn test_read_readme() {
        let dir = tree(&[("README.md", "# Hello")]);
        assert_eq!(read_readme(dir.path()).as_deref(), Some("# Hello"));
        let empty = tree(&[]);
        assert!(read_readme(empty.path()).is_none());
    }

    #[test]
    fn test_non_utf8_readme_is_still_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), b"# Caf\xe9 menu\n").unwrap();

        assert!(static_checks(dir.path()).has_readme);
        let readme = read_readme(dir.path()).unwrap();
        assert!(readme.starts_with("# Caf"));
        assert!(readme.contains('\u{FFFD}'));
        assert!(readme.ends_with("menu\n"));
    }
}
