//! Core IMAP types.

use std::fmt;
use std::num::NonZeroU32;

/// Unique identifier for a message.
///
/// UIDs stay stable across expunges within one `UIDVALIDITY` epoch, which
/// makes them safe to collect in one command and act on in the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub NonZeroU32);

impl Uid {
    /// Creates a new UID.
    ///
    /// Returns `None` if the value is 0.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A set of UIDs as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidSet {
    /// Every message in the mailbox (`1:*`).
    All,
    /// An explicit list, serialized as compressed ranges.
    List(Vec<Uid>),
}

impl UidSet {
    /// Builds a set from any collection of UIDs.
    ///
    /// Duplicates are removed and the output is sorted so that consecutive
    /// runs collapse into `a:b` ranges.
    pub fn from_uids(uids: impl IntoIterator<Item = Uid>) -> Self {
        let mut list: Vec<Uid> = uids.into_iter().collect();
        list.sort_unstable();
        list.dedup();
        Self::List(list)
    }

    /// Returns true if the set selects nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::List(list) if list.is_empty())
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = match self {
            Self::All => return f.write_str("1:*"),
            Self::List(list) => list,
        };

        let mut iter = list.iter().map(|uid| uid.get()).peekable();
        let mut first = true;
        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek().is_some_and(|&next| end.checked_add(1) == Some(next)) {
                end += 1;
                iter.next();
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}:{end}")?;
            }
        }
        Ok(())
    }
}

/// Response status from a tagged or untagged status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing connection.
    Bye,
}

impl Status {
    /// Parses a status keyword, case-insensitively.
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }

    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// Server capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// `IMAP4rev2` (RFC 9051)
    Imap4Rev2,
    /// MOVE extension (RFC 6851)
    Move,
    /// UIDPLUS extension (RFC 4315)
    UidPlus,
    /// STARTTLS support
    StartTls,
    /// LOGIN command is disabled
    LoginDisabled,
    /// SASL mechanism (`AUTH=...`)
    Auth(String),
    /// Anything else
    Other(String),
}

impl Capability {
    /// Parses one capability atom.
    #[must_use]
    pub fn parse(atom: &str) -> Self {
        let upper = atom.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "MOVE" => Self::Move,
            "UIDPLUS" => Self::UidPlus,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            _ => upper
                .strip_prefix("AUTH=")
                .map_or_else(|| Self::Other(upper.clone()), |m| Self::Auth(m.to_string())),
        }
    }
}

/// Mailbox information from SELECT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
    /// Next UID to be assigned.
    pub uid_next: Option<u32>,
}

/// One line of a LIST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Mailbox attributes such as `\HasChildren`.
    pub attributes: Vec<String>,
    /// Hierarchy delimiter, `None` for flat namespaces.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub name: String,
}

impl ListEntry {
    /// Returns true if the mailbox cannot be selected.
    #[must_use]
    pub fn is_noselect(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case("\\Noselect") || a.eq_ignore_ascii_case("\\NonExistent"))
    }
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

    fn uids(values: &[u32]) -> Vec<Uid> {
        values.iter().map(|&v| Uid::new(v).unwrap()).collect()
    }

    #[test]
    fn uid_rejects_zero() {
        assert!(Uid::new(0).is_none());
        assert_eq!(Uid::new(7).unwrap().get(), 7);
    }

    #[test]
    fn uid_set_compresses_runs() {
        let set = UidSet::from_uids(uids(&[7, 1, 2, 3, 9, 10, 2]));
        assert_eq!(set.to_string(), "1:3,7,9:10");
    }

    #[test]
    fn uid_set_all() {
        assert_eq!(UidSet::All.to_string(), "1:*");
        assert!(!UidSet::All.is_empty());
    }

    #[test]
    fn uid_set_empty() {
        let set = UidSet::from_uids(Vec::new());
        assert!(set.is_empty());
        assert_eq!(set.to_string(), "");
    }

    fn expand(set: &str) -> Vec<u32> {
        set.split(',')
            .filter(|part| !part.is_empty())
            .flat_map(|part| match part.split_once(':') {
                Some((a, b)) => a.parse().unwrap()..=b.parse().unwrap(),
                None => {
                    let n: u32 = part.parse().unwrap();
                    n..=n
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn uid_set_selects_exactly_its_uids(values in prop::collection::vec(1u32.., 0..64)) {
            let rendered = UidSet::from_uids(uids(&values)).to_string();

            let mut expected = values.clone();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(expand(&rendered), expected);
        }
    }

    #[test]
    fn uid_set_at_the_top_of_the_range() {
        let set = UidSet::from_uids(uids(&[u32::MAX - 1, u32::MAX]));
        assert_eq!(set.to_string(), format!("{}:{}", u32::MAX - 1, u32::MAX));
    }

    #[test]
    fn capability_parse() {
        assert_eq!(Capability::parse("move"), Capability::Move);
        assert_eq!(Capability::parse("AUTH=PLAIN"), Capability::Auth("PLAIN".into()));
        assert_eq!(Capability::parse("IDLE"), Capability::Other("IDLE".into()));
    }

    #[test]
    fn status_parse() {
        assert_eq!(Status::parse("ok"), Some(Status::Ok));
        assert_eq!(Status::parse("BYE"), Some(Status::Bye));
        assert_eq!(Status::parse("FETCH"), None);
        assert!(Status::PreAuth.is_ok());
        assert!(!Status::No.is_ok());
    }

    #[test]
    fn list_entry_noselect() {
        let entry = ListEntry {
            attributes: vec!["\\NoSelect".into()],
            delimiter: Some('.'),
            name: "Work".into(),
        };
        assert!(entry.is_noselect());
    }
}
