//! Executable lookup on a colon-separated search path.

use std::path::{Path, PathBuf};

use nix::unistd::{self, AccessFlags};

/// Returns the first `directory/program` on `search_path` for which execute
/// permission is confirmed, or `None` if no directory yields a match.
///
/// `search_path` is a colon-separated directory list, typically the value of
/// `PATH`. Empty segments are skipped. Resolution does not apply to names
/// that already contain a path separator; see [`resolve`].
pub fn search<P: AsRef<str>>(program: P, search_path: &str) -> Option<PathBuf> {
    search_path
        .split(':')
        .filter(|directory| !directory.is_empty())
        .map(|directory| Path::new(directory).join(program.as_ref()))
        .find(|candidate| is_executable(candidate))
}

/// Resolves a command name against `search_path`.
///
/// A name containing `/` is taken as an explicit path and returned as-is;
/// anything else goes through [`search`].
pub fn resolve<P: AsRef<str>>(program: P, search_path: &str) -> Option<PathBuf> {
    let program = program.as_ref();
    if program.contains('/') {
        Some(PathBuf::from(program))
    } else {
        search(program, search_path)
    }
}

fn is_executable(path: &Path) -> bool {
    unistd::access(path, AccessFlags::X_OK).is_ok()
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use tempdir::TempDir;

    use super::*;

    fn create_file(path: &Path, mode: u32) {
        File::create(path).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn finds_first_executable_match() {
        let first = TempDir::new("path_search").unwrap();
        let second = TempDir::new("path_search").unwrap();
        create_file(&first.path().join("prog"), 0o755);
        create_file(&second.path().join("prog"), 0o755);

        let search_path = format!("{}:{}", first.path().display(), second.path().display());
        assert_eq!(search("prog", &search_path), Some(first.path().join("prog")));
    }

    #[test]
    fn skips_non_executable_candidates() {
        let first = TempDir::new("path_search").unwrap();
        let second = TempDir::new("path_search").unwrap();
        create_file(&first.path().join("prog"), 0o644);
        create_file(&second.path().join("prog"), 0o755);

        let search_path = format!("{}:{}", first.path().display(), second.path().display());
        assert_eq!(
            search("prog", &search_path),
            Some(second.path().join("prog"))
        );
    }

    #[test]
    fn not_found() {
        let dir = TempDir::new("path_search").unwrap();
        let search_path = format!("{}", dir.path().display());
        assert_eq!(search("no-such-prog", &search_path), None);
    }

    #[test]
    fn explicit_path_skips_search() {
        assert_eq!(
            resolve("/no/such/bin/prog", "/usr/bin"),
            Some(PathBuf::from("/no/such/bin/prog"))
        );
    }
}
