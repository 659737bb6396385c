//! Remote path helpers
//!
//! Remote SFTP paths always use `/` as separator regardless of either
//! side's OS; local paths go through `std::path`.

/// Join remote SFTP path components using `/`.
pub fn join_remote_path(base: &str, component: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, component)
    } else {
        format!("{}/{}", base, component)
    }
}

/// Last component of a remote path, or the path itself if it has none.
pub fn remote_file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote_path() {
        assert_eq!(join_remote_path("/home", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/home/", "file.txt"), "/home/file.txt");
        assert_eq!(join_remote_path("/", "home"), "/home");
    }

    #[test]
    fn test_remote_file_name() {
        assert_eq!(remote_file_name("/home/user/f.txt"), "f.txt");
        assert_eq!(remote_file_name("/home/user/"), "user");
        assert_eq!(remote_file_name("/"), "/");
    }
}
