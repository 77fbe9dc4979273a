//! Filtering over scripted IMAP conversations.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::RefCell;
use std::time::Duration;

use inboxsift_core::{
    Connector, Filter, ImapSession, MatchPolicy, MoveErrorPolicy, Result, Rule, Settings,
};
use inboxsift_imap::Client;
use tokio_test::io::{Builder, Mock};

/// Hands out one pre-scripted session.
struct ScriptedConnector {
    mock: RefCell<Option<Mock>>,
}

impl ScriptedConnector {
    fn new(mock: Mock) -> Self {
        Self {
            mock: RefCell::new(Some(mock)),
        }
    }
}

impl Connector for ScriptedConnector {
    type Session = ImapSession<Mock>;

    async fn connect(&self) -> Result<Self::Session> {
        let mock = self.mock.borrow_mut().take().expect("connected twice");
        let client = Client::from_stream(mock).await?;
        let client = client.login("me", "pw").await?;
        ImapSession::new(client, "imap.test", Some('.')).await
    }
}

fn settings(rules: &[(&str, &str)]) -> Settings {
    Settings {
        mailboxes: vec!["INBOX".to_string()],
        rules: rules
            .iter()
            .map(|(p, f)| Rule::new(*p, f.parse().unwrap()))
            .collect(),
        sleep: Duration::from_secs(300),
        match_policy: MatchPolicy::First,
        move_error_policy: MoveErrorPolicy::AbortMailbox,
    }
}

fn login(builder: &mut Builder) -> &mut Builder {
    builder
        .read(b"* OK [CAPABILITY IMAP4rev1 MOVE] ready\r\n")
        .write(b"A0000 LOGIN me pw\r\n")
        .read(b"A0000 OK [CAPABILITY IMAP4rev1 MOVE] Logged in\r\n")
}

fn fetch(seq: u32, uid: u32, from: &str, subject: &str) -> Vec<u8> {
    let header = format!("From: {from}\r\nSubject: {subject}\r\n\r\n");
    format!(
        "* {seq} FETCH (UID {uid} BODY[HEADER.FIELDS (FROM SUBJECT)] {{{}}}\r\n{header})\r\n",
        header.len()
    )
    .into_bytes()
}

#[tokio::test]
async fn cycle_moves_each_folder_in_one_command() {
    let mock = login(&mut Builder::new())
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 3 EXISTS\r\n* OK [UIDVALIDITY 1] ok\r\nA0001 OK [READ-WRITE] done\r\n")
        .write(b"A0002 UID FETCH 1:* (UID BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])\r\n")
        .read(&fetch(1, 10, "Boss <boss@corp.com>", "Budget"))
        .read(&fetch(2, 11, "digest@lists.example.org", "Weekly digest"))
        .read(&fetch(3, 12, "\"The Boss\" <BOSS@corp.com>", "Re: Budget"))
        .read(b"A0002 OK done\r\n")
        .write(b"A0003 UID MOVE 10,12 Work.Urgent\r\n")
        .read(b"* OK [COPYUID 1 10,12 1:2] moved\r\n* 1 EXPUNGE\r\n* 2 EXPUNGE\r\nA0003 OK done\r\n")
        .write(b"A0004 UID MOVE 11 Lists\r\n")
        .read(b"* 1 EXPUNGE\r\nA0004 OK done\r\n")
        .write(b"A0005 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0005 OK done\r\n")
        .build();
    let filter = Filter::new(
        ScriptedConnector::new(mock),
        settings(&[("boss@", "Work/Urgent"), ("@lists.example.org", "Lists")]),
    );

    let report = filter.run_cycle().await.unwrap();

    assert_eq!(report.filtered, 1);
    assert_eq!(report.matched, 3);
    assert_eq!(report.moved, 3);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn cycle_with_no_matches_only_reads() {
    let mock = login(&mut Builder::new())
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0001 OK done\r\n")
        .write(b"A0002 UID FETCH 1:* (UID BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])\r\n")
        .read(&fetch(1, 5, "friend@home.net", "Hi"))
        .read(b"A0002 OK done\r\n")
        .write(b"A0003 LOGOUT\r\n")
        .read(b"A0003 OK done\r\n")
        .build();
    let filter = Filter::new(ScriptedConnector::new(mock), settings(&[("boss@", "Work")]));

    let report = filter.run_cycle().await.unwrap();

    assert_eq!(report.matched, 0);
    assert_eq!(report.moved, 0);
}

#[tokio::test]
async fn refused_move_is_reported_and_session_closed() {
    let mock = login(&mut Builder::new())
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0001 OK done\r\n")
        .write(b"A0002 UID FETCH 1:* (UID BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])\r\n")
        .read(&fetch(1, 5, "boss@corp.com", "Hi"))
        .read(b"A0002 OK done\r\n")
        .write(b"A0003 UID MOVE 5 Work\r\n")
        .read(b"A0003 NO [TRYCREATE] Mailbox doesn't exist\r\n")
        .write(b"A0004 LOGOUT\r\n")
        .read(b"A0004 OK done\r\n")
        .build();
    let filter = Filter::new(ScriptedConnector::new(mock), settings(&[("boss@", "Work")]));

    let report = filter.run_cycle().await.unwrap();

    assert_eq!(report.filtered, 0);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].1.contains("Work"));
}

#[tokio::test]
async fn provisioning_creates_only_missing_folders() {
    let mock = login(&mut Builder::new())
        .write(b"A0001 LIST \"\" \"Work\"\r\n")
        .read(b"* LIST (\\HasChildren) \".\" Work\r\nA0001 OK done\r\n")
        .write(b"A0002 LIST \"\" \"Work.Urgent\"\r\n")
        .read(b"A0002 OK done\r\n")
        .write(b"A0003 CREATE Work.Urgent\r\n")
        .read(b"A0003 OK done\r\n")
        .write(b"A0004 LOGOUT\r\n")
        .read(b"A0004 OK done\r\n")
        .build();
    let filter = Filter::new(ScriptedConnector::new(mock), settings(&[("boss@", "Work/Urgent")]));

    let report = filter.provision().await.unwrap();

    assert_eq!(report.existing, ["Work"]);
    assert_eq!(report.created, ["Work.Urgent"]);
}

#[tokio::test]
async fn rejected_login_is_fatal() {
    let mock = Builder::new()
        .read(b"* OK ready\r\n")
        .write(b"A0000 LOGIN me pw\r\n")
        .read(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
        .build();
    let filter = Filter::new(ScriptedConnector::new(mock), settings(&[]));

    let err = filter.run_cycle().await.unwrap_err();

    assert!(matches!(err, inboxsift_core::Error::Auth(_)));
    assert!(err.is_fatal());
}
