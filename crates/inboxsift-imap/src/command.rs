//! IMAP command builders and serialization.

use crate::types::UidSet;

/// Commands the client knows how to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY
    Capability,
    /// NOOP
    Noop,
    /// STARTTLS
    StartTls,
    /// LOGIN username password
    Login {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// SELECT mailbox
    Select {
        /// Mailbox to open read-write.
        mailbox: String,
    },
    /// LIST reference pattern
    List {
        /// Reference name, usually empty.
        reference: String,
        /// Mailbox pattern, may contain `*` and `%`.
        pattern: String,
    },
    /// CREATE mailbox
    Create {
        /// Mailbox to create.
        mailbox: String,
    },
    /// UID FETCH set items
    UidFetch {
        /// Messages to fetch.
        uids: UidSet,
        /// Data items to return.
        items: Vec<FetchAttribute>,
    },
    /// UID MOVE set mailbox (RFC 6851)
    UidMove {
        /// Messages to move.
        uids: UidSet,
        /// Destination mailbox.
        mailbox: String,
    },
    /// UID COPY set mailbox
    UidCopy {
        /// Messages to copy.
        uids: UidSet,
        /// Destination mailbox.
        mailbox: String,
    },
    /// UID STORE set +FLAGS.SILENT (\Deleted)
    UidMarkDeleted {
        /// Messages to flag.
        uids: UidSet,
    },
    /// UID EXPUNGE set (RFC 4315)
    UidExpunge {
        /// Messages to expunge.
        uids: UidSet,
    },
    /// EXPUNGE
    Expunge,
    /// LOGOUT
    Logout,
}

/// A FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// The message UID.
    Uid,
    /// Message flags.
    Flags,
    /// Selected header fields, fetched with `BODY.PEEK` so `\Seen` is untouched.
    HeaderFields(Vec<String>),
}

impl Command {
    /// Serializes the command with the given tag, including the trailing CRLF.
    ///
    /// The result holds one part per synchronizing literal plus the final
    /// part: every part but the last ends with a `{n}` announcement, and the
    /// server must answer with a continuation request before the next part
    /// is sent. Mailbox names are written in modified UTF-7.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<Vec<u8>> {
        let mut out = Output::default();
        out.bytes(tag.as_bytes());
        out.bytes(b" ");

        match self {
            Self::Capability => out.bytes(b"CAPABILITY"),
            Self::Noop => out.bytes(b"NOOP"),
            Self::StartTls => out.bytes(b"STARTTLS"),
            Self::Expunge => out.bytes(b"EXPUNGE"),
            Self::Logout => out.bytes(b"LOGOUT"),
            Self::Login { username, password } => {
                out.bytes(b"LOGIN ");
                out.astring(username);
                out.bytes(b" ");
                out.astring(password);
            }
            Self::Select { mailbox } => {
                out.bytes(b"SELECT ");
                out.mailbox(mailbox);
            }
            Self::List { reference, pattern } => {
                out.bytes(b"LIST ");
                out.quoted(&encode_mailbox(reference));
                out.bytes(b" ");
                out.quoted(&encode_mailbox(pattern));
            }
            Self::Create { mailbox } => {
                out.bytes(b"CREATE ");
                out.mailbox(mailbox);
            }
            Self::UidFetch { uids, items } => {
                out.bytes(format!("UID FETCH {uids} ").as_bytes());
                write_fetch_items(&mut out.buf, items);
            }
            Self::UidMove { uids, mailbox } => {
                out.bytes(format!("UID MOVE {uids} ").as_bytes());
                out.mailbox(mailbox);
            }
            Self::UidCopy { uids, mailbox } => {
                out.bytes(format!("UID COPY {uids} ").as_bytes());
                out.mailbox(mailbox);
            }
            Self::UidMarkDeleted { uids } => {
                out.bytes(format!("UID STORE {uids} +FLAGS.SILENT (\\Deleted)").as_bytes());
            }
            Self::UidExpunge { uids } => {
                out.bytes(format!("UID EXPUNGE {uids}").as_bytes());
            }
        }

        out.bytes(b"\r\n");
        out.finish()
    }

    /// Returns the command name for logging; never includes credentials.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::List { .. } => "LIST",
            Self::Create { .. } => "CREATE",
            Self::UidFetch { .. } => "UID FETCH",
            Self::UidMove { .. } => "UID MOVE",
            Self::UidCopy { .. } => "UID COPY",
            Self::UidMarkDeleted { .. } => "UID STORE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Expunge => "EXPUNGE",
            Self::Logout => "LOGOUT",
        }
    }
}

/// Converts a mailbox name to its modified UTF-7 wire form (RFC 3501 5.1.3).
#[must_use]
pub fn encode_mailbox(name: &str) -> String {
    utf7_imap::encode_utf7_imap(name.to_string())
}

/// Converts a modified UTF-7 mailbox name from the wire back to UTF-8.
#[must_use]
pub fn decode_mailbox(name: &str) -> String {
    utf7_imap::decode_utf7_imap(name.to_string())
}

/// Command bytes, cut after each literal announcement.
#[derive(Default)]
struct Output {
    parts: Vec<Vec<u8>>,
    buf: Vec<u8>,
}

impl Output {
    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn mailbox(&mut self, name: &str) {
        self.astring(&encode_mailbox(name));
    }

    /// Writes an astring: a bare atom when possible, a quoted string when
    /// the value is 7-bit text, otherwise a literal.
    fn astring(&mut self, s: &str) {
        if s.bytes().any(needs_literal) {
            self.literal(s.as_bytes());
        } else if s.is_empty() || s.bytes().any(needs_quoting) {
            self.quoted(s);
        } else {
            self.bytes(s.as_bytes());
        }
    }

    fn quoted(&mut self, s: &str) {
        self.buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                self.buf.push(b'\\');
            }
            self.buf.push(b);
        }
        self.buf.push(b'"');
    }

    fn literal(&mut self, data: &[u8]) {
        self.bytes(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.parts.push(std::mem::take(&mut self.buf));
        self.bytes(data);
    }

    fn finish(mut self) -> Vec<Vec<u8>> {
        self.parts.push(self.buf);
        self.parts
    }
}

/// Bytes a quoted string cannot carry.
const fn needs_literal(b: u8) -> bool {
    b >= 0x80 || b == b'\r' || b == b'\n' || b == 0
}

const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b >= 0x7F
}

fn write_fetch_items(buf: &mut Vec<u8>, items: &[FetchAttribute]) {
    buf.push(b'(');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        match item {
            FetchAttribute::Uid => buf.extend_from_slice(b"UID"),
            FetchAttribute::Flags => buf.extend_from_slice(b"FLAGS"),
            FetchAttribute::HeaderFields(fields) => {
                buf.extend_from_slice(b"BODY.PEEK[HEADER.FIELDS (");
                buf.extend_from_slice(fields.join(" ").to_ascii_uppercase().as_bytes());
                buf.extend_from_slice(b")]");
            }
        }
    }
    buf.push(b')');
}

/// Tag generator for IMAP commands.
///
/// Generates sequential tags `A0000`, `A0001`, ... so every command in a
/// session can be matched with its completion response.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Generates the next tag.
    pub fn next_tag(&mut self) -> String {
        let tag = format!("{}{:04}", self.prefix, self.counter);
        self.counter = self.counter.wrapping_add(1);
        tag
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
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
    use crate::types::Uid;

    fn serialize(cmd: &Command) -> String {
        let parts = cmd.serialize("A0001");
        assert_eq!(parts.len(), 1, "unexpected literal in {parts:?}");
        String::from_utf8(parts.concat()).unwrap()
    }

    #[test]
    fn tags_are_sequential() {
        let mut tags = TagGenerator::default();
        assert_eq!(tags.next_tag(), "A0000");
        assert_eq!(tags.next_tag(), "A0001");
        assert_eq!(tags.next_tag(), "A0002");
    }

    #[test]
    fn login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "me@example.com".into(),
            password: "p\"a ss".into(),
        };
        assert_eq!(serialize(&cmd), "A0001 LOGIN me@example.com \"p\\\"a ss\"\r\n");
    }

    #[test]
    fn create_hierarchical_mailbox() {
        let cmd = Command::Create {
            mailbox: "Work.Urgent".into(),
        };
        assert_eq!(serialize(&cmd), "A0001 CREATE Work.Urgent\r\n");

        let cmd = Command::Create {
            mailbox: "Work.Side Projects".into(),
        };
        assert_eq!(serialize(&cmd), "A0001 CREATE \"Work.Side Projects\"\r\n");
    }

    #[test]
    fn list_always_quotes() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "Archive".into(),
        };
        assert_eq!(serialize(&cmd), "A0001 LIST \"\" \"Archive\"\r\n");
    }

    #[test]
    fn uid_fetch_header_fields() {
        let cmd = Command::UidFetch {
            uids: UidSet::All,
            items: vec![
                FetchAttribute::Uid,
                FetchAttribute::HeaderFields(vec!["From".into(), "Subject".into()]),
            ],
        };
        assert_eq!(
            serialize(&cmd),
            "A0001 UID FETCH 1:* (UID BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])\r\n"
        );
    }

    #[test]
    fn uid_move_uses_ranges() {
        let uids = UidSet::from_uids([3, 1, 2].map(|n| Uid::new(n).unwrap()));
        let cmd = Command::UidMove {
            uids,
            mailbox: "Archive".into(),
        };
        assert_eq!(serialize(&cmd), "A0001 UID MOVE 1:3 Archive\r\n");
    }

    #[test]
    fn mark_deleted() {
        let uids = UidSet::from_uids([Uid::new(5).unwrap()]);
        let cmd = Command::UidMarkDeleted { uids };
        assert_eq!(serialize(&cmd), "A0001 UID STORE 5 +FLAGS.SILENT (\\Deleted)\r\n");
    }

    #[test]
    fn mailbox_names_use_modified_utf7() {
        let cmd = Command::Create {
            mailbox: "Rechnungen.Übersicht".into(),
        };
        assert_eq!(serialize(&cmd), "A0001 CREATE Rechnungen.&ANw-bersicht\r\n");

        let cmd = Command::Select {
            mailbox: "Tom & Jerry".into(),
        };
        assert_eq!(serialize(&cmd), "A0001 SELECT \"Tom &- Jerry\"\r\n");

        let uids = UidSet::from_uids([Uid::new(4).unwrap()]);
        let cmd = Command::UidMove {
            uids,
            mailbox: "日本語".into(),
        };
        assert_eq!(serialize(&cmd), "A0001 UID MOVE 4 &ZeVnLIqe-\r\n");
    }

    #[test]
    fn list_pattern_is_encoded() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "Übersicht".into(),
        };
        assert_eq!(serialize(&cmd), "A0001 LIST \"\" \"&ANw-bersicht\"\r\n");
    }

    #[test]
    fn mailbox_names_survive_the_wire() {
        for name in ["INBOX", "Rechnungen.Übersicht", "Tom & Jerry", "日本語/Notes", "a&b"] {
            assert_eq!(decode_mailbox(&encode_mailbox(name)), name);
        }
        assert!(encode_mailbox("Rechnungen.Übersicht").is_ascii());
    }

    #[test]
    fn eight_bit_password_is_sent_as_literal() {
        let cmd = Command::Login {
            username: "me@example.com".into(),
            password: "pässword".into(),
        };
        let parts = cmd.serialize("A0001");

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], b"A0001 LOGIN me@example.com {9}\r\n");
        assert_eq!(parts[1], "pässword\r\n".as_bytes());
    }

    #[test]
    fn both_credentials_as_literals() {
        let cmd = Command::Login {
            username: "jürgen".into(),
            password: "line\nbreak".into(),
        };
        let parts = cmd.serialize("A0001");

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], b"A0001 LOGIN {7}\r\n");
        assert_eq!(parts[1], "jürgen {10}\r\n".as_bytes());
        assert_eq!(parts[2], b"line\nbreak\r\n");
    }

    #[test]
    fn name_hides_credentials() {
        let cmd = Command::Login {
            username: "u".into(),
            password: "secret".into(),
        };
        assert_eq!(cmd.name(), "LOGIN");
    }
}
