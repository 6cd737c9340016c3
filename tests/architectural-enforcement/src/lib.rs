//! Architectural Enforcement Helpers
//!
//! Source scanning shared by the integration tests in `tests/`:
//! - Locate the workspace and the crates under enforcement
//! - Walk their `.rs` files
//! - Strip comments and `#[cfg(test)]` modules so only production code is checked
//!
//! These tests are designed to catch violations early in the development cycle.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: [&str; 2] = ["intro/core/src", "intro/shell/src"];

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File the line lives in
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Workspace root (two levels above this package)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// All `.rs` files below `dir`
pub fn rust_sources(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Production lines of a source file as `(line_number, code)`
///
/// Comments are cut off and scanning stops at the `#[cfg(test)] mod`,
/// since test modules sit at the bottom of each file. A `#[cfg(test)]` on
/// a single item does not end the scan.
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    let lines: Vec<&str> = content.lines().collect();
    let end = lines
        .windows(2)
        .position(|pair| {
            pair[0].trim_start().starts_with("#[cfg(test)]")
                && pair[1].trim_start().starts_with("mod ")
        })
        .unwrap_or(lines.len());

    lines[..end]
        .iter()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.split("//").next().unwrap_or(line)))
        .filter(|(_, code)| !code.trim().is_empty())
        .collect()
}

/// Scan every production directory for lines matching `is_violation`
pub fn find_violations(is_violation: impl Fn(&str) -> bool) -> Vec<Violation> {
    let root = workspace_root();
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        assert!(path.exists(), "missing source directory {}", path.display());

        for file in rust_sources(&path) {
            let Ok(content) = fs::read_to_string(&file) else {
                continue;
            };
            for (line, code) in production_lines(&content) {
                if is_violation(code) {
                    violations.push(Violation {
                        path: file.clone(),
                        line,
                        text: code.trim().to_string(),
                    });
                }
            }
        }
    }

    violations
}

/// Print violations and fail
pub fn report(violations: &[Violation], rule: &str, advice: &[&str]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!();
    for line in advice {
        eprintln!("  ✅ {line}");
    }

    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let src = "fn a() {}\n// note .unwrap()\nlet x = y; // z.unwrap()\n\n#[cfg(test)]\nmod tests { fn b() { c.unwrap(); } }\n";
        let lines = production_lines(src);

        assert_eq!(lines, vec![(1, "fn a() {}"), (3, "let x = y; ")]);
    }

    #[test]
    fn test_gated_item_does_not_end_scan() {
        let src = "#[cfg(test)]\nfn helper() {}\nfn prod() { x.unwrap(); }\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(src);

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], (3, "fn prod() { x.unwrap(); }"));
    }

    #[test]
    fn test_sources_found() {
        let files = rust_sources(&workspace_root().join("intro/core/src"));
        assert!(files.iter().any(|f| f.ends_with("controller.rs")));
        assert!(files.iter().any(|f| f.ends_with("config/mod.rs")));
    }
}
