//! Object names for published artifacts.
//!
//! Browsers fetch these names directly, so the formats are fixed:
//!
//! ```text
//! pkg bucket
//!   <path>.<hash>.js        package script / loader script
//!   <path>.<hash>.ax        stripped metadata archive
//!
//! index bucket
//!   <hash>                  entry document (hash addressed)
//!   <hash>/index.html
//!   <path>[$max]            entry document (path addressed)
//!   <path>[$max]/index.html
//! ```

/// Suffix that distinguishes the unoptimized variant's path-addressed document.
pub const UNMINIFIED_SUFFIX: &str = "$max";

/// Prefix dropped from import paths to form the short document path.
pub const SHORT_PATH_PREFIX: &str = "github.com/";

/// `<path>.<hash>.js`
pub fn script_name(path: &str, hash: &str) -> String {
    format!("{path}.{hash}.js")
}

/// `<path>.<hash>.ax`
pub fn stripped_archive_name(path: &str, hash: &str) -> String {
    format!("{path}.{hash}.ax")
}

/// Names of a hash-addressed entry document: `<hash>` and `<hash>/index.html`.
pub fn hash_document_names(hash: &str) -> [String; 2] {
    [hash.to_string(), format!("{hash}/index.html")]
}

/// Names of a path-addressed entry document.
///
/// Always contains the short form pair; the full form pair follows only
/// when it differs from the short form.
pub fn path_document_names(path: &str, minified: bool) -> Vec<String> {
    let full = if minified {
        path.to_string()
    } else {
        format!("{path}{UNMINIFIED_SUFFIX}")
    };
    let short = full.strip_prefix(SHORT_PATH_PREFIX).unwrap_or(&full);

    let mut names = vec![short.to_string(), format!("{short}/index.html")];
    if short != full {
        names.push(full.clone());
        names.push(format!("{full}/index.html"));
    }
    names
}

/// URL of a script in the package bucket.
pub fn script_url(protocol: &str, host: &str, path: &str, hash: &str) -> String {
    format!("{protocol}://{host}/{}", script_name(path, hash))
}
