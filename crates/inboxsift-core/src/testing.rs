//! In-memory mail server for unit tests.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::rc::Rc;

use inboxsift_imap::Uid;

use crate::message::MessageRef;
use crate::service::{Connector, MailSession};
use crate::{Error, Result};

/// A request the fake server received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Select(String),
    Fetch,
    Exists(String),
    Create(String),
    Move { folder: String, uids: Vec<u32> },
    Disconnect,
}

#[derive(Default)]
struct State {
    separator: char,
    mailboxes: BTreeMap<String, Vec<MessageRef>>,
    refused_creates: HashSet<String>,
    offline: bool,
    reject_login: bool,
    calls: Vec<Call>,
}

/// Shared handle on the fake server; clones see the same state.
#[derive(Clone)]
pub struct FakeServer {
    state: Rc<RefCell<State>>,
}

impl FakeServer {
    pub fn new() -> Self {
        let mut state = State {
            separator: '.',
            ..State::default()
        };
        state.mailboxes.insert("INBOX".to_string(), Vec::new());
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn with_separator(self, separator: char) -> Self {
        self.state.borrow_mut().separator = separator;
        self
    }

    pub fn with_folders<'a>(self, names: impl IntoIterator<Item = &'a str>) -> Self {
        {
            let mut state = self.state.borrow_mut();
            for name in names {
                state.mailboxes.entry(name.to_string()).or_default();
            }
        }
        self
    }

    pub fn with_mailbox<'a>(
        self,
        name: &str,
        messages: impl IntoIterator<Item = (u32, &'a str)>,
    ) -> Self {
        let messages = messages
            .into_iter()
            .map(|(uid, sender)| {
                MessageRef::new(Uid::new(uid).unwrap(), sender, format!("message {uid}"))
            })
            .collect();
        self.state
            .borrow_mut()
            .mailboxes
            .insert(name.to_string(), messages);
        self
    }

    pub fn refuse_create(self, name: &str) -> Self {
        self.state
            .borrow_mut()
            .refused_creates
            .insert(name.to_string());
        self
    }

    pub fn reject_login(self) -> Self {
        self.state.borrow_mut().reject_login = true;
        self
    }

    pub fn drop_connection(&self) {
        self.state.borrow_mut().offline = true;
    }

    pub fn restore_connection(&self) {
        self.state.borrow_mut().offline = false;
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            server: self.clone(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn calls_matching(&self, pred: impl Fn(&Call) -> bool) -> Vec<Call> {
        self.calls().into_iter().filter(|c| pred(c)).collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn folder_exists(&self, name: &str) -> bool {
        self.state.borrow().mailboxes.contains_key(name)
    }

    pub fn mailbox_uids(&self, name: &str) -> Vec<u32> {
        self.state
            .borrow()
            .mailboxes
            .get(name)
            .map(|messages| messages.iter().map(|m| m.uid.get()).collect())
            .unwrap_or_default()
    }

    fn record(&self, call: Call) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.offline {
            return Err(Error::Network("connection reset by peer".to_string()));
        }
        state.calls.push(call);
        Ok(())
    }
}

pub struct FakeConnector {
    server: FakeServer,
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self) -> Result<FakeSession> {
        self.server.record(Call::Connect)?;
        if self.server.state.borrow().reject_login {
            return Err(Error::Auth("invalid credentials".to_string()));
        }
        Ok(FakeSession {
            server: self.server.clone(),
            selected: None,
        })
    }
}

pub struct FakeSession {
    server: FakeServer,
    selected: Option<String>,
}

impl MailSession for FakeSession {
    fn separator(&self) -> char {
        self.server.state.borrow().separator
    }

    async fn select_mailbox(&mut self, mailbox: &str) -> Result<()> {
        self.server.record(Call::Select(mailbox.to_string()))?;
        if !self.server.folder_exists(mailbox) {
            self.selected = None;
            return Err(Error::Mailbox {
                mailbox: mailbox.to_string(),
                reason: "Mailbox doesn't exist".to_string(),
            });
        }
        self.selected = Some(mailbox.to_string());
        Ok(())
    }

    async fn fetch_messages(&mut self) -> Result<Vec<MessageRef>> {
        self.server.record(Call::Fetch)?;
        let mailbox = self
            .selected
            .as_ref()
            .ok_or_else(|| Error::Protocol("no mailbox selected".to_string()))?;
        Ok(self.server.state.borrow().mailboxes[mailbox].clone())
    }

    async fn folder_exists(&mut self, folder: &str) -> Result<bool> {
        self.server.record(Call::Exists(folder.to_string()))?;
        Ok(self.server.folder_exists(folder))
    }

    async fn create_folder(&mut self, folder: &str) -> Result<()> {
        self.server.record(Call::Create(folder.to_string()))?;
        let separator = self.separator();
        let mut state = self.server.state.borrow_mut();

        let parent_missing = folder
            .rsplit_once(separator)
            .is_some_and(|(parent, _)| !state.mailboxes.contains_key(parent));
        if state.refused_creates.contains(folder) || parent_missing {
            return Err(Error::Folder {
                folder: folder.to_string(),
                reason: "Permission denied".to_string(),
            });
        }
        if state.mailboxes.contains_key(folder) {
            return Err(Error::Folder {
                folder: folder.to_string(),
                reason: "Mailbox already exists".to_string(),
            });
        }
        state.mailboxes.insert(folder.to_string(), Vec::new());
        Ok(())
    }

    async fn move_messages(&mut self, uids: &BTreeSet<Uid>, folder: &str) -> Result<()> {
        self.server.record(Call::Move {
            folder: folder.to_string(),
            uids: uids.iter().map(|u| u.get()).collect(),
        })?;
        let source = self
            .selected
            .clone()
            .ok_or_else(|| Error::Protocol("no mailbox selected".to_string()))?;
        let mut state = self.server.state.borrow_mut();
        if !state.mailboxes.contains_key(folder) {
            return Err(Error::Move {
                folder: folder.to_string(),
                reason: "[TRYCREATE] Mailbox doesn't exist".to_string(),
            });
        }

        let messages = state.mailboxes.get_mut(&source).unwrap();
        let (moving, staying): (Vec<_>, Vec<_>) =
            messages.drain(..).partition(|m| uids.contains(&m.uid));
        *messages = staying;
        state.mailboxes.get_mut(folder).unwrap().extend(moving);
        Ok(())
    }

    async fn disconnect(self) -> Result<()> {
        self.server.record(Call::Disconnect)
    }
}
