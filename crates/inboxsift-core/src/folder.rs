//! Hierarchical folder paths.
//!
//! Folders are configured with `/` between levels (`Work/Urgent`) and only
//! turned into the server's own separator when they are sent on the wire.
//! Creating a nested folder requires every ancestor to exist first, so
//! [`derive_hierarchy`] expands a set of targets into the ordered list of
//! folders to provision.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Separator used in configuration and logs.
pub const CONFIG_SEPARATOR: char = '/';

/// A non-empty sequence of non-empty folder names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FolderPath {
    segments: Vec<String>,
}

impl FolderPath {
    /// Parses a path in configuration form (`Work/Urgent`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty path or an empty segment
    /// (`Work//Urgent`, `/Work`, `Work/`).
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<String> = path.split(CONFIG_SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(Error::Config(format!(
                "folder path {path:?} contains an empty segment"
            )));
        }
        Ok(Self { segments })
    }

    /// The individual folder names, shallowest first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of levels.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The path with `separator` between levels, as sent to the server.
    ///
    /// Segment text is passed through unchanged, even if it happens to
    /// contain `separator`.
    #[must_use]
    pub fn to_wire(&self, separator: char) -> String {
        let mut buf = [0; 4];
        self.segments.join(separator.encode_utf8(&mut buf))
    }

    /// Every prefix of this path, shallowest first, ending with the path
    /// itself.
    pub fn ancestors(&self) -> impl Iterator<Item = Self> + '_ {
        (1..=self.segments.len()).map(|depth| Self {
            segments: self.segments[..depth].to_vec(),
        })
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire(CONFIG_SEPARATOR))
    }
}

impl FromStr for FolderPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FolderPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<FolderPath> for String {
    fn from(path: FolderPath) -> Self {
        path.to_string()
    }
}

/// Expands target folders into the full list of folders that must exist.
///
/// Every prefix of every input appears exactly once, and each folder comes
/// after all of its ancestors. Among unrelated folders, first appearance in
/// the input decides the order.
pub fn derive_hierarchy<'a, I>(paths: I) -> Vec<FolderPath>
where
    I: IntoIterator<Item = &'a FolderPath>,
{
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();

    for path in paths {
        for prefix in path.ancestors() {
            if seen.insert(prefix.clone()) {
                ordered.push(prefix);
            }
        }
    }

    ordered
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn path(s: &str) -> FolderPath {
        FolderPath::parse(s).unwrap()
    }

    fn rendered(paths: &[FolderPath]) -> Vec<String> {
        paths.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parse_and_render() {
        let p = path("Work/Urgent");
        assert_eq!(p.segments(), ["Work", "Urgent"]);
        assert_eq!(p.depth(), 2);
        assert_eq!(p.to_string(), "Work/Urgent");
        assert_eq!(p.to_wire('.'), "Work.Urgent");
    }

    #[test]
    fn parse_rejects_empty_segments() {
        for bad in ["", "/", "Work/", "/Work", "Work//Urgent"] {
            assert!(FolderPath::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn segment_containing_wire_separator_is_kept() {
        let p = path("v1.2/Notes");
        assert_eq!(p.to_wire('.'), "v1.2.Notes");
        assert_eq!(p.depth(), 2);
    }

    #[test]
    fn ancestors_shallowest_first() {
        let p = path("a/b/c");
        let prefixes: Vec<_> = p.ancestors().collect();
        assert_eq!(rendered(&prefixes), ["a", "a/b", "a/b/c"]);
    }

    #[test]
    fn hierarchy_shares_parents() {
        let targets = [path("Work/Urgent"), path("Work/Later")];
        let hierarchy = derive_hierarchy(&targets);
        assert_eq!(rendered(&hierarchy), ["Work", "Work/Urgent", "Work/Later"]);
    }

    #[test]
    fn hierarchy_deduplicates_repeated_targets() {
        let targets = [path("News"), path("News"), path("Lists/rust"), path("Lists")];
        let hierarchy = derive_hierarchy(&targets);
        assert_eq!(rendered(&hierarchy), ["News", "Lists", "Lists/rust"]);
    }

    #[test]
    fn hierarchy_of_nothing_is_empty() {
        assert!(derive_hierarchy(&Vec::<FolderPath>::new()).is_empty());
    }

    #[test]
    fn serde_uses_config_form() {
        let p: FolderPath = serde_json::from_str("\"Work/Urgent\"").unwrap();
        assert_eq!(p, path("Work/Urgent"));
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"Work/Urgent\"");
        assert!(serde_json::from_str::<FolderPath>("\"Work//x\"").is_err());
    }

    fn arb_path() -> impl Strategy<Value = FolderPath> {
        prop::collection::vec("[a-c]{1,2}", 1..4).prop_map(|segments| FolderPath { segments })
    }

    proptest! {
        #[test]
        fn hierarchy_is_closed_ordered_and_unique(paths in prop::collection::vec(arb_path(), 0..8)) {
            let hierarchy = derive_hierarchy(&paths);

            let unique: HashSet<_> = hierarchy.iter().collect();
            prop_assert_eq!(unique.len(), hierarchy.len());

            for (index, folder) in hierarchy.iter().enumerate() {
                for ancestor in folder.ancestors().filter(|a| a != folder) {
                    let position = hierarchy.iter().position(|f| *f == ancestor);
                    prop_assert!(position.is_some_and(|p| p < index));
                }
            }

            for target in &paths {
                for prefix in target.ancestors() {
                    prop_assert!(hierarchy.contains(&prefix));
                }
            }
            for folder in &hierarchy {
                prop_assert!(paths.iter().any(|t| t.ancestors().any(|a| a == *folder)));
            }
        }

        #[test]
        fn wire_form_round_trips_when_segments_are_clean(p in arb_path()) {
            let wire = p.to_wire('.');
            let back: Vec<&str> = wire.split('.').collect();
            prop_assert_eq!(back, p.segments().iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
