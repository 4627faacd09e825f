use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::StorageError;

/// Characters left as-is when an object name becomes a file name.
///
/// Everything else, `/` in particular, is percent-encoded so that one
/// object always maps to exactly one file.
const NAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'$')
    .remove(b'@')
    .remove(b'+');

/// Validates a bucket name.
///
/// Buckets map to directories, so they must be a single normal path
/// component.
pub fn validate_bucket(bucket: &str) -> Result<(), StorageError> {
    if bucket.is_empty() {
        return Err(StorageError::InvalidBucket("empty bucket".into()));
    }
    if bucket.starts_with('.') || bucket.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidBucket(format!(
            "bucket must be a plain directory name: {bucket}"
        )));
    }
    Ok(())
}

/// Validates an object name.
///
/// Names are opaque, but must not be empty or one of the directory
/// aliases `.` and `..`.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    match name {
        "" => Err(StorageError::InvalidName("empty name".into())),
        "." | ".." => Err(StorageError::InvalidName(format!(
            "directory alias not allowed: {name}"
        ))),
        _ => Ok(()),
    }
}

/// Percent-encodes an object name into a single file name.
pub fn encode_name(name: &str) -> String {
    utf8_percent_encode(name, NAME_ENCODE_SET).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_bucket() {
        assert!(validate_bucket("").is_err());
    }

    #[test]
    fn rejects_bucket_traversal() {
        assert!(validate_bucket("..").is_err());
        assert!(validate_bucket("a/b").is_err());
        assert!(validate_bucket(".hidden").is_err());
    }

    #[test]
    fn accepts_plain_bucket() {
        assert!(validate_bucket("pkg").is_ok());
    }

    #[test]
    fn rejects_directory_aliases() {
        assert!(validate_name("").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
    }

    #[test]
    fn accepts_path_like_names() {
        assert!(validate_name("github.com/u/app.ff.js").is_ok());
        assert!(validate_name("../x").is_ok());
    }

    #[test]
    fn encodes_separators() {
        assert_eq!(encode_name("a/b.ff.js"), "a%2Fb.ff.js");
        assert_eq!(encode_name("../x"), "..%2Fx");
        assert_eq!(encode_name("app$max/index.html"), "app$max%2Findex.html");
    }

    #[test]
    fn keeps_simple_names() {
        assert_eq!(encode_name("prelude.0a1b.js"), "prelude.0a1b.js");
    }
}
