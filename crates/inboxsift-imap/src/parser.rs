//! Sans-I/O response parser.
//!
//! Parses one complete server response, as produced by
//! [`FramedStream::read_response`](crate::FramedStream::read_response),
//! into a [`Response`]. Literals are expected inline (`{n}\r\n` followed by
//! the `n` raw bytes). Only the responses the client acts on are decoded;
//! everything else is surfaced as [`UntaggedResponse::Other`].

use crate::types::{Capability, ListEntry, Status, Uid};
use crate::{Error, Result};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion, e.g. `A0001 OK done`.
    Tagged {
        /// Tag of the completed command.
        tag: String,
        /// Completion status.
        status: Status,
        /// Optional bracketed response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged data, e.g. `* 3 EXISTS`.
    Untagged(UntaggedResponse),
    /// Continuation request (`+ ...`).
    Continuation(String),
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK/NO/BAD/BYE/PREAUTH [code] text`
    Status {
        /// Status keyword.
        status: Status,
        /// Optional bracketed response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<Capability>),
    /// `* LIST (attrs) delim name`
    List(ListEntry),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n FETCH (...)`
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// `UID` item, if returned.
        uid: Option<Uid>,
        /// `BODY[...]` section contents, if returned.
        section: Option<Vec<u8>>,
    },
    /// Anything the client does not interpret.
    Other(String),
}

/// Bracketed response code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `[CAPABILITY ...]`
    Capability(Vec<Capability>),
    /// `[UIDVALIDITY n]`
    UidValidity(u32),
    /// `[UIDNEXT n]`
    UidNext(u32),
    /// `[TRYCREATE]`
    TryCreate,
    /// Any other code, verbatim.
    Other(String),
}

/// Header fields of one message returned by a `UID FETCH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedHeaders {
    /// The message UID.
    pub uid: Uid,
    /// Raw header block.
    pub header: Vec<u8>,
}

impl FetchedHeaders {
    /// Returns the unfolded value of the first header field called `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<String> {
        header_field(&self.header, name)
    }
}

/// Returns the unfolded value of the first field called `name` in a raw header block.
#[must_use]
pub fn header_field(header: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(header);
    let mut found: Option<String> = None;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with([' ', '\t']) {
            if let Some(value) = found.as_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if found.is_some() {
            break;
        }
        if let Some((field, value)) = line.split_once(':')
            && field.trim().eq_ignore_ascii_case(name)
        {
            found = Some(value.trim().to_string());
        }
    }

    found
}

/// Stateless response parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a single complete response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the response is malformed.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let input = input.strip_suffix(b"\r\n").unwrap_or(input);
        let mut cur = Cursor::new(input);

        if cur.eat(b'+') {
            return Ok(Response::Continuation(cur.rest_text()));
        }

        if cur.eat(b'*') {
            cur.expect(b' ')?;
            return parse_untagged(&mut cur).map(Response::Untagged);
        }

        let tag = cur.atom()?;
        cur.expect(b' ')?;
        let word = cur.atom()?;
        let status = Status::parse(&word).ok_or_else(|| cur.error("expected status keyword"))?;
        let (code, text) = parse_resp_text(&mut cur)?;

        Ok(Response::Tagged {
            tag,
            status,
            code,
            text,
        })
    }
}

fn parse_untagged(cur: &mut Cursor<'_>) -> Result<UntaggedResponse> {
    if cur.peek().is_some_and(|b| b.is_ascii_digit()) {
        let n = cur.number()?;
        cur.expect(b' ')?;
        let word = cur.atom()?.to_ascii_uppercase();
        return match word.as_str() {
            "EXISTS" => Ok(UntaggedResponse::Exists(n)),
            "FETCH" => {
                cur.skip_spaces();
                parse_fetch(cur, n)
            }
            _ => Ok(UntaggedResponse::Other(format!("{n} {word}"))),
        };
    }

    let word = cur.atom()?.to_ascii_uppercase();
    if let Some(status) = Status::parse(&word) {
        let (code, text) = parse_resp_text(cur)?;
        return Ok(UntaggedResponse::Status { status, code, text });
    }

    match word.as_str() {
        "CAPABILITY" => Ok(UntaggedResponse::Capability(parse_capabilities(
            &cur.rest_text(),
        ))),
        "LIST" => parse_list(cur).map(UntaggedResponse::List),
        _ => Ok(UntaggedResponse::Other(format!("{word} {}", cur.rest_text()))),
    }
}

fn parse_capabilities(text: &str) -> Vec<Capability> {
    text.split_whitespace().map(Capability::parse).collect()
}

fn parse_resp_text(cur: &mut Cursor<'_>) -> Result<(Option<ResponseCode>, String)> {
    cur.skip_spaces();
    let code = if cur.eat(b'[') {
        let raw = cur.take_until(b']')?;
        cur.expect(b']')?;
        Some(parse_code(&raw))
    } else {
        None
    };
    Ok((code, cur.rest_text()))
}

fn parse_code(raw: &str) -> ResponseCode {
    let (name, arg) = raw.split_once(' ').unwrap_or((raw, ""));
    match name.to_ascii_uppercase().as_str() {
        "CAPABILITY" => ResponseCode::Capability(parse_capabilities(arg)),
        "UIDVALIDITY" => arg
            .trim()
            .parse()
            .map_or_else(|_| ResponseCode::Other(raw.to_string()), ResponseCode::UidValidity),
        "UIDNEXT" => arg
            .trim()
            .parse()
            .map_or_else(|_| ResponseCode::Other(raw.to_string()), ResponseCode::UidNext),
        "TRYCREATE" => ResponseCode::TryCreate,
        _ => ResponseCode::Other(raw.to_string()),
    }
}

fn parse_list(cur: &mut Cursor<'_>) -> Result<ListEntry> {
    cur.skip_spaces();
    let attributes = cur.atom_list()?;
    cur.expect(b' ')?;
    let delimiter = cur
        .nstring()?
        .and_then(|d| String::from_utf8_lossy(&d).chars().next());
    cur.expect(b' ')?;
    let name = cur
        .nstring()?
        .ok_or_else(|| cur.error("LIST mailbox name cannot be NIL"))?;

    Ok(ListEntry {
        attributes,
        delimiter,
        name: String::from_utf8_lossy(&name).into_owned(),
    })
}

fn parse_fetch(cur: &mut Cursor<'_>, seq: u32) -> Result<UntaggedResponse> {
    cur.expect(b'(')?;
    let mut uid = None;
    let mut section = None;

    loop {
        cur.skip_spaces();
        if cur.eat(b')') {
            break;
        }
        if cur.at_end() {
            return Err(cur.error("unterminated FETCH data"));
        }

        let name = cur.fetch_item_name()?.to_ascii_uppercase();
        cur.skip_spaces();
        if name == "UID" {
            uid = Uid::new(cur.number()?);
        } else if name.starts_with("BODY[") {
            section = Some(cur.nstring()?.unwrap_or_default());
        } else {
            cur.skip_value()?;
        }
    }

    Ok(UntaggedResponse::Fetch { seq, uid, section })
}

/// Byte cursor over one response.
struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        if self.eat(b) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", char::from(b))))
        }
    }

    fn skip_spaces(&mut self) {
        while self.eat(b' ') {}
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        let input = self.input;
        &input[start..self.pos]
    }

    fn take_until(&mut self, stop: u8) -> Result<String> {
        let bytes = self.take_while(|b| b != stop);
        if self.at_end() {
            return Err(self.error(&format!("missing '{}'", char::from(stop))));
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn rest_text(&mut self) -> String {
        let rest = &self.input[self.pos..];
        self.pos = self.input.len();
        String::from_utf8_lossy(rest).trim().to_string()
    }

    fn atom(&mut self) -> Result<String> {
        let bytes = self.take_while(|b| !matches!(b, b' ' | b'(' | b')' | b'[' | b']' | b'\r' | b'\n'));
        if bytes.is_empty() {
            return Err(self.error("expected atom"));
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn number(&mut self) -> Result<u32> {
        let digits = self.take_while(|b| b.is_ascii_digit());
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("expected number"))
    }

    /// `(atom atom ...)`
    fn atom_list(&mut self) -> Result<Vec<String>> {
        self.expect(b'(')?;
        let mut atoms = Vec::new();
        loop {
            self.skip_spaces();
            if self.eat(b')') {
                return Ok(atoms);
            }
            atoms.push(self.atom()?);
        }
    }

    /// NIL, quoted string, literal or bare atom.
    fn nstring(&mut self) -> Result<Option<Vec<u8>>> {
        match self.peek() {
            Some(b'"') => self.quoted().map(Some),
            Some(b'{') => self.literal().map(Some),
            Some(_) => {
                let atom = self.atom()?;
                if atom.eq_ignore_ascii_case("NIL") {
                    Ok(None)
                } else {
                    Ok(Some(atom.into_bytes()))
                }
            }
            None => Err(self.error("expected string")),
        }
    }

    fn quoted(&mut self) -> Result<Vec<u8>> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted string")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn literal(&mut self) -> Result<Vec<u8>> {
        self.expect(b'{')?;
        let len = usize::try_from(self.number()?).map_err(|_| self.error("literal too large"))?;
        self.eat(b'+');
        self.expect(b'}')?;
        self.expect(b'\r')?;
        self.expect(b'\n')?;
        let end = self.pos + len;
        if end > self.input.len() {
            return Err(self.error("literal exceeds response"));
        }
        let data = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(data)
    }

    /// FETCH item name, keeping bracketed sections such as
    /// `BODY[HEADER.FIELDS (FROM)]` in one piece.
    fn fetch_item_name(&mut self) -> Result<String> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b' ' | b'(' | b')' if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected FETCH item"));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    /// Skips one value of any shape.
    fn skip_value(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                loop {
                    self.skip_spaces();
                    if self.eat(b')') {
                        return Ok(());
                    }
                    if self.at_end() {
                        return Err(self.error("unterminated list"));
                    }
                    self.skip_value()?;
                }
            }
            Some(b'"' | b'{') => self.nstring().map(|_| ()),
            Some(_) => {
                self.take_while(|b| !matches!(b, b' ' | b')'));
                Ok(())
            }
            None => Err(self.error("expected value")),
        }
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

    #[test]
    fn tagged_ok() {
        let parsed = ResponseParser::parse(b"A0003 OK LOGIN completed\r\n").unwrap();
        assert_eq!(
            parsed,
            Response::Tagged {
                tag: "A0003".into(),
                status: Status::Ok,
                code: None,
                text: "LOGIN completed".into(),
            }
        );
    }

    #[test]
    fn tagged_no_with_code() {
        let parsed = ResponseParser::parse(b"A0001 NO [TRYCREATE] Mailbox doesn't exist\r\n").unwrap();
        match parsed {
            Response::Tagged {
                status, code, text, ..
            } => {
                assert_eq!(status, Status::No);
                assert_eq!(code, Some(ResponseCode::TryCreate));
                assert_eq!(text, "Mailbox doesn't exist");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn greeting_with_capabilities() {
        let parsed =
            ResponseParser::parse(b"* OK [CAPABILITY IMAP4rev1 MOVE AUTH=PLAIN] Dovecot ready.\r\n")
                .unwrap();
        match parsed {
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Ok,
                code: Some(ResponseCode::Capability(caps)),
                text,
            }) => {
                assert!(caps.contains(&Capability::Move));
                assert!(caps.contains(&Capability::Auth("PLAIN".into())));
                assert_eq!(text, "Dovecot ready.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn uid_validity_code() {
        let parsed = ResponseParser::parse(b"* OK [UIDVALIDITY 1700000000] UIDs valid\r\n").unwrap();
        assert!(matches!(
            parsed,
            Response::Untagged(UntaggedResponse::Status {
                code: Some(ResponseCode::UidValidity(1_700_000_000)),
                ..
            })
        ));
    }

    #[test]
    fn exists() {
        let parsed = ResponseParser::parse(b"* 23 EXISTS\r\n").unwrap();
        assert_eq!(parsed, Response::Untagged(UntaggedResponse::Exists(23)));
    }

    #[test]
    fn capability_line() {
        let parsed = ResponseParser::parse(b"* CAPABILITY IMAP4rev1 UIDPLUS IDLE\r\n").unwrap();
        assert_eq!(
            parsed,
            Response::Untagged(UntaggedResponse::Capability(vec![
                Capability::Imap4Rev1,
                Capability::UidPlus,
                Capability::Other("IDLE".into()),
            ]))
        );
    }

    #[test]
    fn list_quoted_name() {
        let parsed =
            ResponseParser::parse(b"* LIST (\\HasNoChildren) \".\" \"Work.Urgent\"\r\n").unwrap();
        assert_eq!(
            parsed,
            Response::Untagged(UntaggedResponse::List(ListEntry {
                attributes: vec!["\\HasNoChildren".into()],
                delimiter: Some('.'),
                name: "Work.Urgent".into(),
            }))
        );
    }

    #[test]
    fn list_atom_name_and_nil_delimiter() {
        let parsed = ResponseParser::parse(b"* LIST () NIL INBOX\r\n").unwrap();
        match parsed {
            Response::Untagged(UntaggedResponse::List(entry)) => {
                assert!(entry.attributes.is_empty());
                assert_eq!(entry.delimiter, None);
                assert_eq!(entry.name, "INBOX");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn list_literal_name() {
        let parsed = ResponseParser::parse(b"* LIST () \"/\" {8}\r\nA \"B\" C!\r\n").unwrap();
        match parsed {
            Response::Untagged(UntaggedResponse::List(entry)) => {
                assert_eq!(entry.delimiter, Some('/'));
                assert_eq!(entry.name, "A \"B\" C!");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fetch_with_header_literal() {
        let header = b"From: Boss <boss@company.com>\r\nSubject: Q3\r\n\r\n";
        let mut raw = format!(
            "* 1 FETCH (UID 42 BODY[HEADER.FIELDS (FROM SUBJECT)] {{{}}}\r\n",
            header.len()
        )
        .into_bytes();
        raw.extend_from_slice(header);
        raw.extend_from_slice(b")\r\n");

        let parsed = ResponseParser::parse(&raw).unwrap();
        assert_eq!(
            parsed,
            Response::Untagged(UntaggedResponse::Fetch {
                seq: 1,
                uid: Uid::new(42),
                section: Some(header.to_vec()),
            })
        );
    }

    #[test]
    fn fetch_uid_after_section_and_flags() {
        let raw = b"* 7 FETCH (FLAGS (\\Seen \\Answered) BODY[HEADER.FIELDS (FROM)] \"From: a@b\" UID 9)\r\n";
        let parsed = ResponseParser::parse(raw).unwrap();
        assert_eq!(
            parsed,
            Response::Untagged(UntaggedResponse::Fetch {
                seq: 7,
                uid: Uid::new(9),
                section: Some(b"From: a@b".to_vec()),
            })
        );
    }

    #[test]
    fn fetch_nil_section() {
        let parsed = ResponseParser::parse(b"* 2 FETCH (UID 5 BODY[HEADER.FIELDS (FROM)] NIL)\r\n").unwrap();
        assert!(matches!(
            parsed,
            Response::Untagged(UntaggedResponse::Fetch { section: Some(ref s), .. }) if s.is_empty()
        ));
    }

    #[test]
    fn fetch_unterminated_is_error() {
        let err = ResponseParser::parse(b"* 2 FETCH (UID 5\r\n").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn continuation() {
        let parsed = ResponseParser::parse(b"+ Ready for literal\r\n").unwrap();
        assert_eq!(parsed, Response::Continuation("Ready for literal".into()));
    }

    #[test]
    fn header_field_unfolds() {
        let header = b"Subject: a very\r\n long subject\r\nFrom: \"Shop\" <news@shop.com>\r\n\r\n";
        assert_eq!(header_field(header, "subject").as_deref(), Some("a very long subject"));
        assert_eq!(
            header_field(header, "FROM").as_deref(),
            Some("\"Shop\" <news@shop.com>")
        );
        assert_eq!(header_field(header, "To"), None);
    }
}
