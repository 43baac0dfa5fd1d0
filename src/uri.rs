//! Scheme-prefixed locations: `scheme://folder/file?key=value`.

use std::str::FromStr;

use url::{Url, form_urlencoded};

use crate::{FsError, Params, posix};

/// The parts of a location handed to [`Registry::open`](crate::Registry::open).
///
/// | Input | Scheme | Folder | File |
/// |-------|--------|--------|------|
/// | `mem://x.txt` | `mem` | `""` | `x.txt` |
/// | `file:///srv/data/a.csv` | `file` | `/srv/data` | `a.csv` |
/// | `/srv/data/` | `file` | `/srv/data` | `""` |
/// | `notes.txt` | `file` | `""` | `notes.txt` |
/// | `C:\dir\a.txt` | `file` | `C:/dir` | `a.txt` |
///
/// Without `://`, and for anything starting with `/` or a drive letter, the
/// scheme is `file` and the path is taken verbatim. Other schemes are parsed
/// with [`url::Url`]: host and path together form the location, and any
/// user, password or host also land in [`params`](Self::params) next to the
/// decoded query pairs. A trailing `/` means the location is a folder. For
/// repeated query keys the first value wins; empty values are dropped.
///
/// # Example
///
/// ```rust
/// use vpath::ParsedUrl;
///
/// let parsed = ParsedUrl::parse("s3://alice:pw@bucket/logs/today.txt?region=eu")?;
/// assert_eq!(parsed.scheme, "s3");
/// assert_eq!(parsed.folder, "bucket/logs");
/// assert_eq!(parsed.file, "today.txt");
/// assert_eq!(parsed.extension(), Some("txt"));
/// assert_eq!(parsed.params["region"], "eu");
/// assert_eq!(parsed.params["user"], "alice");
/// assert_eq!(parsed.params["host"], "bucket");
/// # Ok::<(), vpath::FsError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    /// Lower-case scheme selecting the driver.
    pub scheme: String,
    /// Everything before the last `/`; becomes the store root.
    pub folder: String,
    /// Final component; becomes the handle's initial path.
    pub file: String,
    /// Store constructor arguments.
    pub params: Params,
}

impl ParsedUrl {
    /// Split `input` into scheme, folder, file and parameters.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidUrl`] if a non-`file` location is not a valid URL
    pub fn parse(input: &str) -> Result<Self, FsError> {
        if is_host_path(input) {
            return Ok(Self::local(&input.replace('\\', "/"), None));
        }
        match input.split_once("://") {
            None => Ok(Self::local(input, None)),
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("file") => {
                let (path, query) = match rest.split_once('?') {
                    Some((path, query)) => (path, Some(query)),
                    None => (rest, None),
                };
                Ok(Self::local(path, query))
            }
            Some(_) => Self::remote(input),
        }
    }

    fn local(path: &str, query: Option<&str>) -> Self {
        let (folder, file) = split(path);
        Self {
            scheme: "file".to_string(),
            folder,
            file,
            params: query.map(query_params).unwrap_or_default(),
        }
    }

    fn remote(input: &str) -> Result<Self, FsError> {
        let url = Url::parse(input).map_err(|e| FsError::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;
        let host = url.host_str().unwrap_or_default();
        let (folder, file) = split(&format!("{host}{}", url.path()));

        let mut params = url.query().map(query_params).unwrap_or_default();
        if !url.username().is_empty() {
            params.insert("user".to_string(), url.username().to_string());
        }
        if let Some(password) = url.password() {
            params.insert("password".to_string(), password.to_string());
        }
        if !host.is_empty() {
            params.insert("host".to_string(), host.to_string());
        }

        Ok(Self {
            scheme: url.scheme().to_string(),
            folder,
            file,
            params,
        })
    }

    /// Extension of [`file`](Self::file) without the dot, if it has one.
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.file.rsplit_once('.')?;
        (!stem.is_empty() && !ext.is_empty()).then_some(ext)
    }

    /// Folder and file joined back together.
    pub fn path(&self) -> String {
        posix::join(&self.folder, &self.file)
    }
}

impl FromStr for ParsedUrl {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A host path: absolute POSIX, or starting with a drive letter.
fn is_host_path(input: &str) -> bool {
    let bytes = input.as_bytes();
    let drive = bytes.len() > 1 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    input.starts_with('/') || drive
}

fn split(path: &str) -> (String, String) {
    if path.ends_with('/') {
        let folder = path.trim_end_matches('/');
        let folder = if folder.is_empty() { "/" } else { folder };
        return (folder.to_string(), String::new());
    }
    match path.rfind('/') {
        Some(idx) => {
            let head = path[..=idx].trim_end_matches('/');
            let head = if head.is_empty() { "/" } else { head };
            (head.to_string(), path[idx + 1..].to_string())
        }
        None => (String::new(), path.to_string()),
    }
}

fn query_params(query: &str) -> Params {
    let mut params = Params::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if !value.is_empty() {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_are_local_files() {
        let parsed = ParsedUrl::parse("notes.txt").unwrap();
        assert_eq!(parsed.scheme, "file");
        assert_eq!(parsed.folder, "");
        assert_eq!(parsed.file, "notes.txt");
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn absolute_and_windows_paths() {
        let parsed = ParsedUrl::parse("/srv/data/a.csv").unwrap();
        assert_eq!((parsed.folder.as_str(), parsed.file.as_str()), ("/srv/data", "a.csv"));

        let parsed = ParsedUrl::parse("/top").unwrap();
        assert_eq!((parsed.folder.as_str(), parsed.file.as_str()), ("/", "top"));

        let parsed = ParsedUrl::parse(r"C:\dir\a.txt").unwrap();
        assert_eq!(parsed.scheme, "file");
        assert_eq!(parsed.folder, "C:/dir");
        assert_eq!(parsed.file, "a.txt");
    }

    #[test]
    fn file_scheme_keeps_the_raw_path() {
        let parsed = ParsedUrl::parse("file:///tmp/my dir/f.log?mode=ro").unwrap();
        assert_eq!(parsed.folder, "/tmp/my dir");
        assert_eq!(parsed.file, "f.log");
        assert_eq!(parsed.params["mode"], "ro");
        assert_eq!(parsed.path(), "/tmp/my dir/f.log");
    }

    #[test]
    fn trailing_slash_is_a_folder() {
        let parsed = ParsedUrl::parse("file:///tmp/dir/").unwrap();
        assert_eq!(parsed.folder, "/tmp/dir");
        assert_eq!(parsed.file, "");
        assert_eq!(ParsedUrl::parse("/").unwrap().folder, "/");
    }

    #[test]
    fn memory_urls() {
        let parsed = ParsedUrl::parse("mem://x.txt").unwrap();
        assert_eq!(parsed.scheme, "mem");
        assert_eq!(parsed.folder, "");
        assert_eq!(parsed.file, "x.txt");

        let parsed = ParsedUrl::parse("memory://dir/sub/leaf").unwrap();
        assert_eq!(parsed.folder, "dir/sub");
        assert_eq!(parsed.file, "leaf");
    }

    #[test]
    fn query_pairs_are_decoded_first_wins() {
        let parsed = ParsedUrl::parse("mem://x?a=1&a=2&b=hello%20world&empty=").unwrap();
        assert_eq!(parsed.params["a"], "1");
        assert_eq!(parsed.params["b"], "hello world");
        assert!(!parsed.params.contains_key("empty"));
    }

    #[test]
    fn invalid_remote_url() {
        let err = ParsedUrl::parse("http://[::1/x").unwrap_err();
        assert!(matches!(err, FsError::InvalidUrl { .. }));
    }

    #[test]
    fn extensions() {
        let ext = |s: &str| ParsedUrl::parse(s).unwrap().extension().map(str::to_string);
        assert_eq!(ext("a.tar.gz").as_deref(), Some("gz"));
        assert_eq!(ext(".bashrc"), None);
        assert_eq!(ext("README"), None);
    }
}
