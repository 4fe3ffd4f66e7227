use anyhow::anyhow;
use url::Url;

use crate::constants::{PATH_SEP, SCHEME_SEP};

pub fn sanitize_url(url: &str) -> anyhow::Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(anyhow!("URL cannot be empty"));
    }

    if url.contains('\0') || url.contains('\r') || url.contains('\n') {
        return Err(anyhow!("URL contains invalid control characters"));
    }

    let parsed_url = Url::parse(url).map_err(|e| anyhow!("Invalid URL format: {}", e))?;

    match parsed_url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Unsupported URL scheme: {}", other)),
    }

    let url_str = parsed_url.to_string();
    Ok(url_str.trim_end_matches(PATH_SEP).to_string())
}

/// Byte offset of the `/` that starts the path of `url`.
///
/// Without a scheme the first `/` is the path start.
pub fn url_path_start(url: &str) -> Option<usize> {
    match url.find(SCHEME_SEP) {
        None => url.find(PATH_SEP),
        Some(pi) => {
            let host_start = pi + SCHEME_SEP.len();
            url[host_start..].find(PATH_SEP).map(|i| host_start + i)
        }
    }
}

/// Splits `http://host/a/b` into `("http://host/", "a/b")`.
pub fn split_url_prefix(url: &str) -> Option<(&str, &str)> {
    if !url.contains(SCHEME_SEP) {
        return None;
    }
    let i = url_path_start(url)?;
    Some((&url[..=i], &url[i + 1..]))
}

/// Concatenates a base address and a path with exactly one separator between them.
pub fn join_url(base: &str, path: &str) -> String {
    let path = path.trim_start_matches(PATH_SEP);
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches(PATH_SEP), path)
}

/// Lexical path cleanup: collapses repeated separators, drops `.` elements and
/// resolves `..` against the preceding element.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with(PATH_SEP);

    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split(PATH_SEP) {
        match seg {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Joins non-empty elements with `/` and cleans the result.
pub fn join_path(elems: &[&str]) -> String {
    let non_empty: Vec<&str> = elems.iter().copied().filter(|e| !e.is_empty()).collect();
    if non_empty.is_empty() {
        return String::new();
    }
    clean_path(&non_empty.join("/"))
}
