//! Carrying out a move plan.

use std::collections::BTreeSet;

use tracing::info;

use crate::Result;
use crate::classify::MovePlan;
use crate::service::MailSession;

/// Moves every batch of `plan` with one request per destination folder.
///
/// Folder paths are translated to the session's separator. Returns the
/// number of distinct messages moved; a message planned into several
/// folders counts once.
///
/// # Errors
///
/// Stops at the first failed batch and returns its error; batches already
/// moved stay moved.
pub async fn execute_plan<M: MailSession>(session: &mut M, plan: &MovePlan) -> Result<usize> {
    let separator = session.separator();
    let mut moved = BTreeSet::new();

    for (folder, uids) in plan.iter() {
        let destination = folder.to_wire(separator);
        info!("Moving {} message(s) to {destination}", uids.len());
        session.move_messages(uids, &destination).await?;
        moved.extend(uids.iter().copied());
    }

    Ok(moved.len())
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
    use crate::Error;
    use crate::folder::FolderPath;
    use crate::service::Connector;
    use crate::testing::{Call, FakeServer};
    use inboxsift_imap::Uid;

    fn entry(folder: &str, uid: u32) -> (FolderPath, Uid) {
        (folder.parse().unwrap(), Uid::new(uid).unwrap())
    }

    #[tokio::test]
    async fn one_request_per_folder() {
        let server = FakeServer::new()
            .with_folders(["Work", "Work.Urgent", "Lists"])
            .with_mailbox("INBOX", [(1, "a@x"), (2, "b@x"), (3, "c@x"), (4, "d@x")]);
        let mut session = server.connector().connect().await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();

        let plan: MovePlan = [
            entry("Work/Urgent", 1),
            entry("Work/Urgent", 2),
            entry("Lists", 4),
            entry("Work/Urgent", 3),
        ]
        .into_iter()
        .collect();

        let moved = execute_plan(&mut session, &plan).await.unwrap();

        assert_eq!(moved, 4);
        assert_eq!(
            server.calls_matching(|c| matches!(c, Call::Move { .. })),
            [
                Call::Move {
                    folder: "Work.Urgent".into(),
                    uids: vec![1, 2, 3],
                },
                Call::Move {
                    folder: "Lists".into(),
                    uids: vec![4],
                },
            ]
        );
        assert_eq!(server.mailbox_uids("Work.Urgent"), [1, 2, 3]);
        assert!(server.mailbox_uids("INBOX").is_empty());
    }

    #[tokio::test]
    async fn empty_plan_moves_nothing() {
        let server = FakeServer::new().with_mailbox("INBOX", [(1, "a@x")]);
        let mut session = server.connector().connect().await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();

        assert_eq!(execute_plan(&mut session, &MovePlan::new()).await.unwrap(), 0);
        assert!(server.calls_matching(|c| matches!(c, Call::Move { .. })).is_empty());
    }

    #[tokio::test]
    async fn message_in_two_batches_counts_once() {
        let server = FakeServer::new()
            .with_folders(["Work", "Work.Urgent"])
            .with_mailbox("INBOX", [(1, "boss@corp.com"), (2, "hr@corp.com")]);
        let mut session = server.connector().connect().await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();

        let plan: MovePlan = [entry("Work/Urgent", 1), entry("Work", 1), entry("Work", 2)]
            .into_iter()
            .collect();
        let moved = execute_plan(&mut session, &plan).await.unwrap();

        assert_eq!(moved, 2);
        assert_eq!(server.calls_matching(|c| matches!(c, Call::Move { .. })).len(), 2);
        assert_eq!(server.mailbox_uids("Work.Urgent"), [1]);
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let server = FakeServer::new()
            .with_folders(["A", "C"])
            .with_mailbox("INBOX", [(1, "a@x"), (2, "b@x"), (3, "c@x")]);
        let mut session = server.connector().connect().await.unwrap();
        session.select_mailbox("INBOX").await.unwrap();

        let plan: MovePlan = [entry("A", 1), entry("B", 2), entry("C", 3)]
            .into_iter()
            .collect();
        let err = execute_plan(&mut session, &plan).await.unwrap_err();

        assert!(matches!(err, Error::Move { ref folder, .. } if folder == "B"));
        assert_eq!(server.mailbox_uids("A"), [1]);
        assert_eq!(server.mailbox_uids("INBOX"), [2, 3]);
    }
}
