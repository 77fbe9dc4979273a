//! Scripted-session tests for the IMAP client.
//!
//! Each test replays a server transcript through `tokio_test::io::Builder`,
//! which also asserts the exact bytes the client writes.

use tokio_test::io::Builder;

use inboxsift_imap::{Capability, Client, Error, Uid, UidSet};

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 STARTTLS AUTH=PLAIN] ready\r\n";

fn uids(values: &[u32]) -> UidSet {
    UidSet::from_uids(values.iter().map(|&v| Uid::new(v).unwrap()))
}

#[tokio::test]
async fn login_select_fetch_move_logout() {
    let header = b"From: Boss <boss@company.com>\r\nSubject: Q3 numbers\r\n\r\n";
    let mut fetch = format!(
        "* 1 FETCH (UID 42 BODY[HEADER.FIELDS (FROM SUBJECT)] {{{}}}\r\n",
        header.len()
    )
    .into_bytes();
    fetch.extend_from_slice(header);
    fetch.extend_from_slice(b")\r\n");

    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN me@example.com secret\r\n")
        .read(b"A0000 OK [CAPABILITY IMAP4rev1 MOVE UIDPLUS] Logged in\r\n")
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 1 EXISTS\r\n")
        .read(b"* OK [UIDVALIDITY 1700000000] UIDs valid\r\n")
        .read(b"* OK [UIDNEXT 43] Predicted next UID\r\n")
        .read(b"A0001 OK [READ-WRITE] Select completed\r\n")
        .write(b"A0002 UID FETCH 1:* (UID BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])\r\n")
        .read(&fetch)
        .read(b"A0002 OK Fetch completed\r\n")
        .write(b"A0003 UID MOVE 42 Work.Urgent\r\n")
        .read(b"* OK [COPYUID 1 42 7] Moved\r\n")
        .read(b"* 1 EXPUNGE\r\n")
        .read(b"A0003 OK Move completed\r\n")
        .write(b"A0004 LOGOUT\r\n")
        .read(b"* BYE Logging out\r\n")
        .read(b"A0004 OK Logout completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("me@example.com", "secret").await.unwrap();
    assert!(client.supports_move());
    assert!(client.has_capability(&Capability::UidPlus));

    let (mut client, status) = client.select("INBOX").await.unwrap();
    assert_eq!(status.exists, 1);
    assert_eq!(status.uid_validity, Some(1_700_000_000));
    assert_eq!(status.uid_next, Some(43));
    assert_eq!(client.mailbox(), "INBOX");

    let headers = client
        .uid_fetch_headers(&UidSet::All, &["FROM", "SUBJECT"])
        .await
        .unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].uid.get(), 42);
    assert_eq!(headers[0].field("from").as_deref(), Some("Boss <boss@company.com>"));
    assert_eq!(headers[0].field("subject").as_deref(), Some("Q3 numbers"));

    client.uid_move(&uids(&[42]), "Work.Urgent").await.unwrap();
    client.logout().await.unwrap();
}

#[tokio::test]
async fn login_without_advertised_capabilities_asks_for_them() {
    let mock = Builder::new()
        .read(b"* OK ready\r\n")
        .write(b"A0000 LOGIN user pass\r\n")
        .read(b"A0000 OK Logged in\r\n")
        .write(b"A0001 CAPABILITY\r\n")
        .read(b"* CAPABILITY IMAP4rev1 MOVE\r\n")
        .read(b"A0001 OK done\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("user", "pass").await.unwrap();
    assert!(client.supports_move());
}

#[tokio::test]
async fn rejected_login_is_auth_error() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN user wrong\r\n")
        .read(b"A0000 NO [AUTHENTICATIONFAILED] Authentication failed.\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client.login("user", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Auth(ref text) if text == "Authentication failed."));
}

#[tokio::test]
async fn rejected_select_hands_the_client_back() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN me pw\r\n")
        .read(b"A0000 OK [CAPABILITY IMAP4rev1] Logged in\r\n")
        .write(b"A0001 SELECT Missing\r\n")
        .read(b"A0001 NO [NONEXISTENT] Unknown Mailbox\r\n")
        .write(b"A0002 SELECT INBOX\r\n")
        .read(b"* 0 EXISTS\r\nA0002 OK Select completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("me", "pw").await.unwrap();
    let failed = client.select("Missing").await.unwrap_err();
    assert!(matches!(failed.error, Error::No(_)));

    let client = failed.client.unwrap();
    let (_, status) = client.select("INBOX").await.unwrap();
    assert_eq!(status.exists, 0);
}

#[tokio::test]
async fn bye_greeting_is_rejected() {
    let mock = Builder::new().read(b"* BYE too many connections\r\n").build();

    let err = Client::from_stream(mock).await.unwrap_err();
    assert!(matches!(err, Error::Bye(_)));
}

#[tokio::test]
async fn move_falls_back_to_copy_store_expunge() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN user pass\r\n")
        .read(b"A0000 OK [CAPABILITY IMAP4rev1] Logged in\r\n")
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 3 EXISTS\r\n")
        .read(b"A0001 OK done\r\n")
        .write(b"A0002 UID COPY 1:3 Archive\r\n")
        .read(b"A0002 OK copied\r\n")
        .write(b"A0003 UID STORE 1:3 +FLAGS.SILENT (\\Deleted)\r\n")
        .read(b"A0003 OK stored\r\n")
        .write(b"A0004 EXPUNGE\r\n")
        .read(b"* 1 EXPUNGE\r\n* 1 EXPUNGE\r\n* 1 EXPUNGE\r\n")
        .read(b"A0004 OK expunged\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("user", "pass").await.unwrap();
    let (mut client, _) = client.select("INBOX").await.unwrap();
    client.uid_move(&uids(&[1, 2, 3]), "Archive").await.unwrap();
}

#[tokio::test]
async fn list_create_and_delimiter() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN user pass\r\n")
        .read(b"A0000 OK [CAPABILITY IMAP4rev1 MOVE] Logged in\r\n")
        .write(b"A0001 LIST \"\" \"\"\r\n")
        .read(b"* LIST (\\Noselect) \".\" \"\"\r\n")
        .read(b"A0001 OK done\r\n")
        .write(b"A0002 LIST \"\" \"Work\"\r\n")
        .read(b"A0002 OK done\r\n")
        .write(b"A0003 CREATE Work\r\n")
        .read(b"A0003 OK created\r\n")
        .write(b"A0004 CREATE Work.Urgent\r\n")
        .read(b"A0004 NO [ALREADYEXISTS] Mailbox exists\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("user", "pass").await.unwrap();

    assert_eq!(client.hierarchy_delimiter().await.unwrap(), Some('.'));
    assert!(client.list("", "Work").await.unwrap().is_empty());
    client.create("Work").await.unwrap();
    let err = client.create("Work.Urgent").await.unwrap_err();
    assert!(matches!(err, Error::No(_)));
}

#[tokio::test]
async fn fetching_an_empty_set_sends_nothing() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN user pass\r\n")
        .read(b"A0000 OK [CAPABILITY IMAP4rev1] Logged in\r\n")
        .write(b"A0001 SELECT Empty\r\n")
        .read(b"A0001 OK done\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("user", "pass").await.unwrap();
    let (mut client, status) = client.select("Empty").await.unwrap();
    assert_eq!(status.exists, 0);

    let empty = UidSet::from_uids(Vec::new());
    assert!(client.uid_fetch_headers(&empty, &["FROM"]).await.unwrap().is_empty());
    client.uid_move(&empty, "Archive").await.unwrap();
}

#[tokio::test]
async fn noop_in_authenticated_state() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN me pw\r\n")
        .read(b"A0000 OK [CAPABILITY IMAP4rev1] Logged in\r\n")
        .write(b"A0001 NOOP\r\n")
        .read(b"* 3 EXISTS\r\nA0001 OK NOOP completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("me", "pw").await.unwrap();
    client.noop().await.unwrap();
}

#[tokio::test]
async fn eight_bit_password_waits_for_continuation() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN me {9}\r\n")
        .read(b"+ Ready for literal data\r\n")
        .write("pässword\r\n".as_bytes())
        .read(b"A0000 OK [CAPABILITY IMAP4rev1] Logged in\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    client.login("me", "pässword").await.unwrap();
}

#[tokio::test]
async fn refused_literal_is_auth_error() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN me {9}\r\n")
        .read(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client.login("me", "pässword").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}

#[tokio::test]
async fn non_ascii_mailboxes_travel_as_modified_utf7() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN me pw\r\n")
        .read(b"A0000 OK [CAPABILITY IMAP4rev1] Logged in\r\n")
        .write(b"A0001 LIST \"\" \"Rechnungen.&ANw-bersicht\"\r\n")
        .read(b"* LIST (\\HasNoChildren) \".\" Rechnungen.&ANw-bersicht\r\n")
        .read(b"A0001 OK done\r\n")
        .write(b"A0002 CREATE Rechnungen.&ANw-bersicht.2026\r\n")
        .read(b"A0002 OK done\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("me", "pw").await.unwrap();

    let entries = client.list("", "Rechnungen.Übersicht").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Rechnungen.Übersicht");

    client.create("Rechnungen.Übersicht.2026").await.unwrap();
}
