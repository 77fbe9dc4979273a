//! Making sure every target folder exists.

use tracing::{debug, error, info};

use crate::Result;
use crate::folder::FolderPath;
use crate::service::MailSession;

/// What provisioning did, folder by folder (wire names).
#[derive(Debug, Default)]
pub struct ProvisionReport {
    /// Folders created by this run.
    pub created: Vec<String>,
    /// Folders that were already there.
    pub existing: Vec<String>,
    /// Folders that could not be checked or created, with the reason.
    pub failed: Vec<(String, crate::Error)>,
}

impl ProvisionReport {
    /// Returns true if every folder exists now.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Creates every folder of `hierarchy` that does not exist yet.
///
/// `hierarchy` must list parents before children, as
/// [`derive_hierarchy`](crate::derive_hierarchy) does. A folder the server
/// refuses is logged and skipped; its children will usually fail too.
///
/// # Errors
///
/// Only fatal errors (lost connection, protocol violations) are returned.
pub async fn provision_folders<M: MailSession>(
    session: &mut M,
    hierarchy: &[FolderPath],
) -> Result<ProvisionReport> {
    let separator = session.separator();
    let mut report = ProvisionReport::default();

    for folder in hierarchy {
        let name = folder.to_wire(separator);

        let exists = match session.folder_exists(&name).await {
            Ok(exists) => exists,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(folder = %name, error = %e, "Could not check folder");
                report.failed.push((name, e));
                continue;
            }
        };
        if exists {
            debug!(folder = %name, "Folder already exists");
            report.existing.push(name);
            continue;
        }

        match session.create_folder(&name).await {
            Ok(()) => {
                info!("Created {name}");
                report.created.push(name);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!("Could not create {name}: {e}");
                report.failed.push((name, e));
            }
        }
    }

    Ok(report)
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
    use crate::folder::derive_hierarchy;
    use crate::service::Connector;
    use crate::testing::{Call, FakeServer};

    fn hierarchy(paths: &[&str]) -> Vec<FolderPath> {
        let paths: Vec<FolderPath> = paths.iter().map(|p| p.parse().unwrap()).collect();
        derive_hierarchy(&paths)
    }

    #[tokio::test]
    async fn creates_parents_before_children() {
        let server = FakeServer::new();
        let mut session = server.connector().connect().await.unwrap();

        let report = provision_folders(&mut session, &hierarchy(&["Work/Urgent", "Work/Later"]))
            .await
            .unwrap();

        assert_eq!(report.created, ["Work", "Work.Urgent", "Work.Later"]);
        assert!(report.existing.is_empty());
        assert!(report.is_complete());
        assert_eq!(
            server.calls_matching(|c| matches!(c, Call::Create(_))),
            [
                Call::Create("Work".into()),
                Call::Create("Work.Urgent".into()),
                Call::Create("Work.Later".into()),
            ]
        );
    }

    #[tokio::test]
    async fn second_run_creates_nothing() {
        let server = FakeServer::new();
        let folders = hierarchy(&["Work/Urgent", "Lists"]);

        let mut session = server.connector().connect().await.unwrap();
        provision_folders(&mut session, &folders).await.unwrap();
        server.clear_calls();

        let report = provision_folders(&mut session, &folders).await.unwrap();
        assert!(report.created.is_empty());
        assert_eq!(report.existing, ["Work", "Work.Urgent", "Lists"]);
        assert!(server.calls_matching(|c| matches!(c, Call::Create(_))).is_empty());
    }

    #[tokio::test]
    async fn uses_session_separator() {
        let server = FakeServer::new().with_separator('/');
        let mut session = server.connector().connect().await.unwrap();

        let report = provision_folders(&mut session, &hierarchy(&["a/b"])).await.unwrap();
        assert_eq!(report.created, ["a", "a/b"]);
    }

    #[tokio::test]
    async fn refused_folder_does_not_stop_the_rest() {
        let server = FakeServer::new().refuse_create("Work");
        let mut session = server.connector().connect().await.unwrap();

        let report = provision_folders(&mut session, &hierarchy(&["Work/Urgent", "Lists"]))
            .await
            .unwrap();

        let failed: Vec<_> = report.failed.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(failed, ["Work", "Work.Urgent"]);
        assert_eq!(report.created, ["Lists"]);
        assert!(!report.is_complete());
        assert!(matches!(report.failed[0].1, Error::Folder { .. }));
    }

    #[tokio::test]
    async fn lost_connection_is_returned() {
        let server = FakeServer::new();
        let mut session = server.connector().connect().await.unwrap();
        server.drop_connection();

        let err = provision_folders(&mut session, &hierarchy(&["Work"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
