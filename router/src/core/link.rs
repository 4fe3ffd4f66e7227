//! Compact file addresses of the form `clusterId:serverId/relative/path`.
//!
//! A link names a file without embedding a network address; the registry turns
//! it into a URL on demand. Strings that carry no `cluster:server` segment are
//! kept as bare paths so legacy addresses pass through unchanged.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use common::api_error::RouteError;
use common::constants::{LINK_PAIR_SEP, PATH_SEP};
use common::url_utils::{join_path, join_url, split_url_prefix};

use crate::core::registry::Registry;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link(String);

/// Borrowed view of a parsed link. `path` keeps its leading separator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkParts<'a> {
    pub cluster_id: &'a str,
    pub server_id: &'a str,
    pub path: &'a str,
}

fn split_link(s: &str) -> Option<LinkParts<'_>> {
    let i = s.find(PATH_SEP)?;
    let head = &s[..i];
    let j = head.find(LINK_PAIR_SEP)?;
    // `scheme://host/...` is a URL, not a link with an empty server id
    if j + 1 == head.len() && s[i..].starts_with("//") {
        return None;
    }
    Some(LinkParts {
        cluster_id: &head[..j],
        server_id: &head[j + 1..],
        path: &s[i..],
    })
}

/// True when `s` starts with a `cluster:server` segment. A `scheme://` URL is
/// never link form, so `http://h/x` is false.
pub fn is_link_form(s: &str) -> bool {
    split_link(s).is_some()
}

/// Splits a serialized link. Never fails: input without routing information
/// comes back as a bare path with empty cluster and server ids.
pub fn parse(serialized: &str) -> LinkParts<'_> {
    split_link(serialized).unwrap_or(LinkParts {
        cluster_id: "",
        server_id: "",
        path: serialized,
    })
}

impl Link {
    /// Joins `cluster:server` and `path`, cleaning the path the way a file
    /// system would.
    pub fn new(cluster_id: &str, server_id: &str, path: &str) -> Self {
        let head = format!("{}{}{}", cluster_id, LINK_PAIR_SEP, server_id);
        Link(join_path(&[&head, path]))
    }

    /// Like [`Link::new`], but rejects ids that cannot be encoded.
    pub fn try_new(cluster_id: &str, server_id: &str, path: &str) -> Result<Self, RouteError> {
        let bad = |id: &str| id.is_empty() || id.contains(LINK_PAIR_SEP) || id.contains(PATH_SEP);
        if bad(cluster_id) || bad(server_id) {
            return Err(RouteError::MalformedAddress(format!(
                "{}{}{}",
                cluster_id, LINK_PAIR_SEP, server_id
            )));
        }
        Ok(Self::new(cluster_id, server_id, path))
    }

    /// Wraps a string verbatim, routable or not.
    pub fn passthrough(s: impl Into<String>) -> Self {
        Link(s.into())
    }

    /// Maps a public URL back to the server that publishes its prefix.
    ///
    /// `None` when no registered server owns the URL; callers that still want
    /// to keep the URL must wrap it with [`Link::passthrough`] explicitly.
    pub fn from_url(url: &str, registry: &Registry) -> Option<Self> {
        let (prefix, rest) = split_url_prefix(url)?;
        let (cluster_id, server_id) = registry.reverse_lookup(prefix)?;
        Some(Self::new(&cluster_id, &server_id, rest))
    }

    /// Public URL of the file: the owning server's proxy address plus the path.
    ///
    /// Bare paths are returned unchanged.
    pub fn to_url(&self, registry: &Registry) -> Result<String, RouteError> {
        let Some(parts) = split_link(&self.0) else {
            return Ok(self.0.clone());
        };
        let server = registry
            .get_server(parts.cluster_id, parts.server_id)
            .ok_or_else(|| RouteError::server_not_found(parts.cluster_id, parts.server_id))?;
        Ok(join_url(&server.proxy_address, parts.path))
    }

    pub fn parts(&self) -> LinkParts<'_> {
        parse(&self.0)
    }

    pub fn cluster_id(&self) -> &str {
        self.parts().cluster_id
    }

    pub fn server_id(&self) -> &str {
        self.parts().server_id
    }

    pub fn path(&self) -> &str {
        self.parts().path
    }

    pub fn is_routable(&self) -> bool {
        is_link_form(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Link {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Link::passthrough(s))
    }
}

impl From<String> for Link {
    fn from(s: String) -> Self {
        Link(s)
    }
}

impl From<&str> for Link {
    fn from(s: &str) -> Self {
        Link(s.to_string())
    }
}

impl AsRef<str> for Link {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
