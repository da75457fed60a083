use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shipyard::errors::{Result, ShipyardError};
use shipyard::release::Repository;

/// The shared remote both a [`FakeRepository`] and a
/// [`SimulatedHost`](crate::SimulatedHost) talk to: tag name to commit.
#[derive(Clone, Default)]
pub struct FakeRemote {
    tags: Arc<Mutex<BTreeMap<String, String>>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, tag: &str, commit: &str) {
        self.tags
            .lock()
            .unwrap()
            .insert(tag.to_string(), commit.to_string());
    }

    pub fn tags(&self) -> BTreeMap<String, String> {
        self.tags.lock().unwrap().clone()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.lock().unwrap().contains_key(tag)
    }
}

#[derive(Debug)]
struct RepoState {
    clean: bool,
    branch: Option<String>,
    head: String,
    /// Local tags: name to (commit, message).
    tags: BTreeMap<String, (String, String)>,
    fail_push: bool,
}

/// In-memory [`Repository`]: a local checkout plus a [`FakeRemote`].
#[derive(Clone)]
pub struct FakeRepository {
    state: Arc<Mutex<RepoState>>,
    remote: FakeRemote,
}

impl FakeRepository {
    /// A clean checkout of `main` at `head`.
    pub fn new(head: &str) -> Self {
        Self::with_remote(head, FakeRemote::new())
    }

    pub fn with_remote(head: &str, remote: FakeRemote) -> Self {
        Self {
            state: Arc::new(Mutex::new(RepoState {
                clean: true,
                branch: Some("main".to_string()),
                head: head.to_string(),
                tags: BTreeMap::new(),
                fail_push: false,
            })),
            remote,
        }
    }

    pub fn remote(&self) -> &FakeRemote {
        &self.remote
    }

    pub fn set_dirty(&self) {
        self.state.lock().unwrap().clean = false;
    }

    pub fn checkout_branch(&self, branch: &str) {
        self.state.lock().unwrap().branch = Some(branch.to_string());
    }

    pub fn detach_head(&self) {
        self.state.lock().unwrap().branch = None;
    }

    pub fn fail_push(&self, fail: bool) {
        self.state.lock().unwrap().fail_push = fail;
    }

    /// Add a tag that already exists locally and on the remote.
    pub fn add_tag(&self, name: &str, commit: &str) {
        self.state
            .lock()
            .unwrap()
            .tags
            .insert(name.to_string(), (commit.to_string(), String::new()));
        self.remote.publish(name, commit);
    }

    pub fn local_tags(&self) -> Vec<String> {
        self.state.lock().unwrap().tags.keys().cloned().collect()
    }

    pub fn tag_message(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .tags
            .get(name)
            .map(|(_, message)| message.clone())
    }
}

#[async_trait]
impl Repository for FakeRepository {
    async fn is_clean(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().clean)
    }

    async fn current_branch(&self) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().branch.clone())
    }

    async fn head_commit(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().head.clone())
    }

    async fn list_tags(&self, prefix: &str) -> Result<Vec<String>> {
        let wanted = format!("{prefix}-");
        Ok(self
            .state
            .lock()
            .unwrap()
            .tags
            .keys()
            .filter(|name| name.starts_with(&wanted))
            .cloned()
            .collect())
    }

    async fn tag_commit(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tags
            .get(name)
            .map(|(commit, _)| commit.clone()))
    }

    async fn create_annotated_tag(&self, name: &str, commit: &str, message: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.tags.contains_key(name) {
            return Err(ShipyardError::Git(format!("tag '{name}' already exists")));
        }
        state
            .tags
            .insert(name.to_string(), (commit.to_string(), message.to_string()));
        Ok(())
    }

    async fn push_tag(&self, remote: &str, name: &str) -> Result<()> {
        let state = self.state.lock().unwrap();
        if state.fail_push {
            return Err(ShipyardError::transport(format!(
                "pushing {name} to {remote} failed: connection reset"
            )));
        }
        let (commit, _) = state
            .tags
            .get(name)
            .ok_or_else(|| ShipyardError::Git(format!("no local tag '{name}'")))?;
        self.remote.publish(name, commit);
        Ok(())
    }

    async fn delete_local_tag(&self, name: &str) -> Result<()> {
        self.state.lock().unwrap().tags.remove(name);
        Ok(())
    }
}
