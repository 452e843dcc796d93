//! Application state: the single in-memory registry, its persistence, and the
//! judge collaborator.
//!
//! This module owns:
//!   - the registry (users, problems, submissions, login sessions) behind one lock
//!   - write-through persistence of the registry to a key-value store
//!   - the prompts struct (from TOML or defaults)
//!   - the optional judge client
//!
//! Every mutation takes the write lock, changes the registry, then persists
//! the touched keys before releasing it, so memory and store never diverge
//! in order.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, instrument, warn};

use crate::config::{bank_problems, load_judge_config_from_env, Prompts};
use crate::domain::{Capability, Problem, Submission, SubmissionResult, User};
use crate::editor::Editor;
use crate::error::{AppError, AppResult};
use crate::judge::{self, Judge};
use crate::seeds::{seed_problems, seed_users};
use crate::store::{
    FileStore, KvStore, MemoryStore, StoreError, KEY_PROBLEMS, KEY_SESSIONS, KEY_SUBMISSIONS,
    KEY_USERS,
};

/// A logged-in session: the current-user pointer plus the editor workspace.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub selected_problem: Option<String>,
    #[serde(default)]
    pub editor: Editor,
    pub created_at: DateTime<Utc>,
    /// Busy flag: a judge call is in flight for this session.
    #[serde(skip)]
    pub pending: bool,
    #[serde(skip)]
    pub last_result: Option<SubmissionResult>,
}

impl Session {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            selected_problem: None,
            editor: Editor::default(),
            created_at: Utc::now(),
            pending: false,
            last_result: None,
        }
    }
}

#[derive(Default)]
pub struct Registry {
    pub users: Vec<User>,
    pub problems: Vec<Problem>,
    pub submissions: Vec<Submission>,
    pub sessions: HashMap<String, Session>,
}

impl Registry {
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_by_name(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn problem(&self, id: &str) -> Option<&Problem> {
        self.problems.iter().find(|p| p.id == id)
    }

    pub fn session_mut(&mut self, token: &str) -> AppResult<&mut Session> {
        self.sessions.get_mut(token).ok_or(AppError::Unauthorized)
    }
}

/// Which persisted keys a mutation touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateKey {
    Users,
    Problems,
    Submissions,
    Sessions,
}

/// The authenticated caller of a command.
#[derive(Clone, Debug)]
pub struct Actor {
    pub token: String,
    pub user: User,
}

impl Actor {
    pub fn can(&self, cap: Capability) -> bool {
        self.user.role.can(cap)
    }

    pub fn require(&self, cap: Capability) -> AppResult<()> {
        if self.can(cap) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("role {:?} lacks {:?}", self.user.role, cap)))
        }
    }
}

pub struct AppState {
    registry: RwLock<Registry>,
    store: Arc<dyn KvStore>,
    pub judge: Option<Arc<dyn Judge>>,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from env: load config, open the store, seed, init the judge.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> AppResult<Self> {
        let cfg = load_judge_config_from_env();
        let prompts = cfg.as_ref().map(|c| c.prompts.clone()).unwrap_or_default();
        let bank = cfg.as_ref().map(bank_problems).unwrap_or_default();

        let data_path = std::env::var("DATA_PATH").unwrap_or_else(|_| "./data/judge.json".into());
        let store: Arc<dyn KvStore> = if data_path == "memory" {
            info!(target: "store", "Using in-memory store; state is lost on exit.");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(FileStore::open(&data_path)?)
        };

        Self::load(store, judge::from_env(), prompts, bank)
    }

    /// Load the registry from `store`, seeding users and problems on first run.
    #[instrument(level = "info", skip_all)]
    pub fn load(
        store: Arc<dyn KvStore>,
        judge: Option<Arc<dyn Judge>>,
        prompts: Prompts,
        bank: Vec<Problem>,
    ) -> AppResult<Self> {
        let mut reg = Registry {
            users: read_key(store.as_ref(), KEY_USERS)?.unwrap_or_default(),
            problems: Vec::new(),
            submissions: read_key(store.as_ref(), KEY_SUBMISSIONS)?.unwrap_or_default(),
            sessions: read_key(store.as_ref(), KEY_SESSIONS)?.unwrap_or_default(),
        };
        let stored_problems: Option<Vec<Problem>> = read_key(store.as_ref(), KEY_PROBLEMS)?;

        let mut seeded = Vec::new();
        if reg.users.is_empty() {
            reg.users = seed_users()?;
            seeded.push(StateKey::Users);
            info!(target: "codejudge_backend", "Seeded admin account.");
        }
        match stored_problems {
            Some(p) => reg.problems = p,
            None => {
                // Bank entries win over built-in seeds with the same id.
                reg.problems = bank;
                for p in seed_problems() {
                    if reg.problem(&p.id).is_none() {
                        reg.problems.push(p);
                    }
                }
                seeded.push(StateKey::Problems);
            }
        }

        // Sessions pointing at deleted users are dropped.
        let before = reg.sessions.len();
        let users = &reg.users;
        reg.sessions.retain(|_, s| users.iter().any(|u| u.id == s.user_id));
        if reg.sessions.len() != before {
            seeded.push(StateKey::Sessions);
        }

        info!(
            target: "codejudge_backend",
            users = reg.users.len(),
            problems = reg.problems.len(),
            submissions = reg.submissions.len(),
            sessions = reg.sessions.len(),
            "Startup inventory"
        );

        let state = Self { registry: RwLock::new(reg), store, judge, prompts };
        if !seeded.is_empty() {
            let reg = state.registry.try_read().map_err(|e| AppError::Internal(e.to_string()))?;
            state.persist(&reg, &seeded)?;
        }
        Ok(state)
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().await
    }

    /// Write the given keys of `reg` to the store.
    pub fn persist(&self, reg: &Registry, keys: &[StateKey]) -> AppResult<()> {
        for key in keys {
            let result = match key {
                StateKey::Users => write_key(self.store.as_ref(), KEY_USERS, &reg.users),
                StateKey::Problems => write_key(self.store.as_ref(), KEY_PROBLEMS, &reg.problems),
                StateKey::Submissions => {
                    write_key(self.store.as_ref(), KEY_SUBMISSIONS, &reg.submissions)
                }
                StateKey::Sessions => write_key(self.store.as_ref(), KEY_SESSIONS, &reg.sessions),
            };
            if let Err(e) = result {
                error!(target: "store", ?key, error = %e, "Failed to persist state");
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Resolve a bearer token to its user.
    #[instrument(level = "debug", skip_all)]
    pub async fn authenticate(&self, token: &str) -> AppResult<Actor> {
        let reg = self.read().await;
        let session = reg.sessions.get(token).ok_or(AppError::Unauthorized)?;
        let user = reg.user(&session.user_id).cloned().ok_or(AppError::Unauthorized)?;
        Ok(Actor { token: token.to_string(), user })
    }
}

fn read_key<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str::<T>(&raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            warn!(target: "store", %key, error = %e, "Ignoring unreadable persisted value");
            Ok(None)
        }
    }
}

fn write_key<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> Result<(), StoreError> {
    store.set(key, serde_json::to_string(value)?)
}
