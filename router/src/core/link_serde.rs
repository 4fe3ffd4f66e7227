//! Serialized form of an optional link field.
//!
//! On output a present link is written as its resolved public URL and an
//! absent one as `null`. On input either a compact link or a URL is accepted;
//! URLs are mapped back through the registry. Both directions need the
//! registry, so they are exposed as a `Serialize` wrapper and a
//! `DeserializeSeed` rather than as plain derives.

use serde::de::{DeserializeSeed, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, warn};

use crate::core::link::{Link, is_link_form};
use crate::core::registry::Registry;

/// Serializes an optional link as its public URL.
pub struct ResolvedLink<'a> {
    link: Option<&'a Link>,
    registry: &'a Registry,
}

impl<'a> ResolvedLink<'a> {
    pub fn new(link: Option<&'a Link>, registry: &'a Registry) -> Self {
        Self { link, registry }
    }

    fn url(link: &Link, registry: &Registry) -> String {
        match link.to_url(registry) {
            Ok(url) => url,
            Err(e) => {
                // keep the compact form so a reader can still route it later
                warn!(link = %link, "cannot resolve link for output: {e}");
                link.as_str().to_string()
            }
        }
    }

    /// Text form: empty when absent.
    pub fn to_text(&self) -> String {
        self.link
            .map(|l| Self::url(l, self.registry))
            .unwrap_or_default()
    }
}

impl Serialize for ResolvedLink<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.link {
            None => serializer.serialize_none(),
            Some(link) => serializer.serialize_some(&Self::url(link, self.registry)),
        }
    }
}

/// Accepted input shapes. The object form is the legacy nullable-string
/// encoding some producers still emit.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLinkField {
    Text(String),
    Legacy {
        #[serde(rename = "String")]
        string: String,
        #[serde(rename = "Valid")]
        valid: bool,
    },
}

/// Deserializes an optional link field against a registry.
#[derive(Clone, Copy)]
pub struct LinkSeed<'a> {
    registry: &'a Registry,
}

impl<'a> LinkSeed<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Decodes a compact link or a URL. Unknown URLs are kept verbatim as
    /// non-routable links.
    pub fn decode(&self, raw: &str) -> Link {
        if is_link_form(raw) {
            return Link::passthrough(raw);
        }
        Link::from_url(raw, self.registry).unwrap_or_else(|| {
            debug!(url = raw, "no registered server owns url, keeping it verbatim");
            Link::passthrough(raw)
        })
    }

    /// Text form: an empty string is an absent link.
    pub fn decode_text(&self, text: &str) -> Option<Link> {
        (!text.is_empty()).then(|| self.decode(text))
    }
}

impl<'de> DeserializeSeed<'de> for LinkSeed<'_> {
    type Value = Option<Link>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        let raw: Option<RawLinkField> = Option::deserialize(deserializer)?;
        Ok(match raw {
            None => None,
            Some(RawLinkField::Text(s)) => Some(self.decode(&s)),
            Some(RawLinkField::Legacy { string, valid }) => valid.then(|| Link::passthrough(string)),
        })
    }
}
