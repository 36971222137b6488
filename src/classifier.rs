use serde::Serialize;

use crate::error::ClassifierError;
use crate::trie::{ArenaStats, Tst};

/// Result of a successful [`UriClassifier::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution<'a, H> {
    /// The registered prefix that matched (`SCRIPT_NAME`).
    pub script_name: &'a str,
    /// What is left of the URI after the prefix (`PATH_INFO`).
    pub path_info: &'a str,
    /// The handler registered under `script_name`.
    #[serde(skip)]
    pub handler: &'a H,
}

/// Routes request paths to handlers by longest registered prefix.
///
/// Registering `/blog` sends `/blog`, `/blog/` and `/blog/2024/post` to the
/// same handler, splitting the path into the matched prefix and the rest:
///
/// ```rust
/// use trellis::UriClassifier;
///
/// let mut routes = UriClassifier::new();
/// routes.register("/blog", "blog").unwrap();
/// routes.register("/", "root").unwrap();
///
/// let hit = routes.resolve("/blog/2024/post").unwrap();
/// assert_eq!((hit.script_name, hit.path_info, *hit.handler), ("/blog", "/2024/post", "blog"));
///
/// // The root handler always sees a path that still starts with '/'.
/// let hit = routes.resolve("/about").unwrap();
/// assert_eq!((hit.script_name, hit.path_info), ("/", "/about"));
/// ```
///
/// `resolve` only reads, so a classifier built at startup can be shared
/// between threads; changing it while others resolve needs outside locking.
#[derive(Debug)]
pub struct UriClassifier<H> {
    trie: Tst<H>,
}

impl<H> Default for UriClassifier<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> UriClassifier<H> {
    pub fn new() -> Self {
        Self { trie: Tst::new() }
    }

    /// Classifier whose node arena grows `line_width` nodes at a time, up to
    /// `max_lines` lines when given.
    pub fn with_limits(line_width: usize, max_lines: Option<usize>) -> Self {
        Self {
            trie: Tst::with_limits(line_width, max_lines),
        }
    }

    /// Register `handler` under `uri`.
    ///
    /// # Errors
    ///
    /// [`ClassifierError::DuplicateKey`] if `uri` is already registered (the
    /// existing handler stays), [`ClassifierError::NullKey`] for an empty
    /// `uri`, [`ClassifierError::InvalidKey`] for NUL bytes or a non-ASCII
    /// first byte, [`ClassifierError::AllocationFailed`] if the arena is full.
    pub fn register(&mut self, uri: &str, handler: H) -> Result<(), ClassifierError> {
        self.trie.insert(uri.as_bytes(), handler, false)?;
        tracing::debug!(uri, "registered handler");
        Ok(())
    }

    /// Register `handler` under `uri`, returning the handler it displaced.
    ///
    /// # Errors
    ///
    /// As [`UriClassifier::register`], minus `DuplicateKey`.
    pub fn register_or_replace(
        &mut self,
        uri: &str,
        handler: H,
    ) -> Result<Option<H>, ClassifierError> {
        let previous = self.trie.insert(uri.as_bytes(), handler, true)?;
        tracing::debug!(uri, replaced = previous.is_some(), "registered handler");
        Ok(previous)
    }

    /// Remove `uri` and return its handler, or `None` if it was not
    /// registered. Other registrations are unaffected.
    pub fn unregister(&mut self, uri: &str) -> Option<H> {
        let handler = self.trie.remove(uri.as_bytes());
        if handler.is_some() {
            tracing::debug!(uri, "unregistered handler");
        }
        handler
    }

    /// Find the handler for `uri` by longest registered prefix.
    ///
    /// An exact match yields an empty `path_info`. A match on the prefix
    /// `"/"` yields the whole of `uri` as `path_info`. `None` when no
    /// registered key is a prefix of `uri`.
    pub fn resolve<'a>(&'a self, uri: &'a str) -> Option<Resolution<'a, H>> {
        let (len, handler) = self.trie.longest_prefix(uri.as_bytes())?;
        // A registered key is valid UTF-8 and equals uri[..len], so len falls
        // on a char boundary.
        let (script_name, rest) = uri.split_at(len);
        let path_info = if script_name == "/" { uri } else { rest };
        Some(Resolution {
            script_name,
            path_info,
            handler,
        })
    }

    /// Handler registered under exactly `uri`.
    pub fn get(&self, uri: &str) -> Option<&H> {
        self.trie.get(uri.as_bytes())
    }

    /// Registered URIs, sorted.
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self
            .trie
            .keys()
            .into_iter()
            .map(|key| String::from_utf8_lossy(&key).into_owned())
            .collect();
        uris.sort_unstable();
        uris
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn arena_stats(&self) -> ArenaStats {
        self.trie.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_has_empty_path_info() {
        let mut uc = UriClassifier::new();
        uc.register("/blog", 1).unwrap();
        let hit = uc.resolve("/blog").unwrap();
        assert_eq!(hit.script_name, "/blog");
        assert_eq!(hit.path_info, "");
        assert_eq!(*hit.handler, 1);
    }

    #[test]
    fn root_keeps_the_leading_slash() {
        let mut uc = UriClassifier::new();
        uc.register("/", ()).unwrap();
        let hit = uc.resolve("/").unwrap();
        assert_eq!((hit.script_name, hit.path_info), ("/", "/"));
        let hit = uc.resolve("/anything/here").unwrap();
        assert_eq!((hit.script_name, hit.path_info), ("/", "/anything/here"));
    }

    #[test]
    fn empty_and_foreign_uris_do_not_resolve() {
        let mut uc = UriClassifier::new();
        uc.register("/", ()).unwrap();
        assert!(uc.resolve("").is_none());
        assert!(uc.resolve("blog").is_none());
        assert!(uc.resolve("\u{e9}t\u{e9}").is_none());
    }

    #[test]
    fn replace_returns_the_old_handler() {
        let mut uc = UriClassifier::new();
        assert_eq!(uc.register_or_replace("/x", "a"), Ok(None));
        assert_eq!(uc.register_or_replace("/x", "b"), Ok(Some("a")));
        assert_eq!(uc.get("/x"), Some(&"b"));
    }

    #[test]
    fn uris_lists_every_registration() {
        let mut uc = UriClassifier::new();
        for uri in ["/pre", "/", "/pre/fix", "/a?b", "api"] {
            uc.register(uri, ()).unwrap();
        }
        uc.unregister("/pre");
        assert_eq!(uc.uris(), ["/", "/a?b", "/pre/fix", "api"]);
    }

    #[test]
    fn multibyte_prefixes_split_on_char_boundaries() {
        let mut uc = UriClassifier::new();
        uc.register("/caf\u{e9}", 7).unwrap();
        let hit = uc.resolve("/caf\u{e9}/menu").unwrap();
        assert_eq!(hit.script_name, "/caf\u{e9}");
        assert_eq!(hit.path_info, "/menu");
    }
}
