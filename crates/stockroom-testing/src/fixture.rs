//! Fixture files under `fixtures/` and throwaway files for file-reading tests.

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub struct Fixture;

impl Fixture {
    /// Absolute path of `relative_path` under the workspace root.
    pub fn path(relative_path: &str) -> PathBuf {
        let workspace_root = std::env::var("CARGO_MANIFEST_DIR")
            .map(|dir| {
                let p = Path::new(&dir);
                p.ancestors()
                    .find(|a| a.join("fixtures").is_dir())
                    .unwrap_or(p)
                    .to_path_buf()
            })
            .unwrap_or_else(|_| std::env::current_dir().unwrap());
        workspace_root.join(relative_path)
    }

    /// Read a fixture file as text.
    ///
    /// Panics if the file is missing.
    pub fn read(relative_path: &str) -> String {
        let full_path = Self::path(relative_path);
        std::fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("fixture not found at {}: {}", full_path.display(), e))
    }
}

/// Write `contents` to a fresh file in the system temp dir and return its path.
///
/// The extension selects the parser in code that sniffs it (`csv` / `json`).
pub fn scratch_file(extension: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("stockroom-{}.{extension}", Uuid::new_v4()));
    std::fs::write(&path, contents)
        .unwrap_or_else(|e| panic!("cannot write scratch file {}: {}", path.display(), e));
    path
}
