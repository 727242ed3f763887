// src/backend.rs
//
// Engine root: the users database plus the collaborators every user
// shares (message store, clock, uidValidity counter, settings).

use eyre::eyre;
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::cfg::{Config, DeletePolicy, RenamePolicy, StoreConfig};
use crate::clock::{Clock, RealClock};
use crate::error::{Error, Result};
use crate::hierarchy::{ValidityCounter, INBOX};
use crate::store::{FsStore, MemoryStore, MessageStore};
use crate::user::User;

/// Hierarchy and policy choices fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub delimiter: String,
    pub rename_policy: RenamePolicy,
    pub delete_policy: DeletePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delimiter: ".".to_string(),
            rename_policy: RenamePolicy::default(),
            delete_policy: DeletePolicy::default(),
        }
    }
}

impl From<&Config> for Settings {
    fn from(cfg: &Config) -> Self {
        Self {
            delimiter: cfg.delimiter.clone(),
            rename_policy: cfg.rename_policy,
            delete_policy: cfg.delete_policy,
        }
    }
}

pub(crate) struct Shared {
    pub(crate) settings: Settings,
    pub(crate) store: Arc<dyn MessageStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) validity: Arc<ValidityCounter>,
    message_limit: RwLock<Option<u32>>,
}

impl Shared {
    pub(crate) fn message_limit(&self) -> Result<Option<u32>> {
        Ok(*self.message_limit.read()?)
    }
}

pub struct Backend {
    shared: Arc<Shared>,
    users: RwLock<BTreeMap<String, Arc<User>>>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("settings", &self.shared.settings)
            .finish()
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::new(Settings::default(), Arc::new(MemoryStore::new()), Arc::new(RealClock))
    }
}

impl Backend {
    /// uidValidity values start at the clock's current Unix time.
    pub fn new(settings: Settings, store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>) -> Self {
        let seed = u32::try_from(clock.now().timestamp()).unwrap_or(1);
        debug!("Backend uidvalidity seed {}", seed);
        Self {
            shared: Arc::new(Shared {
                settings,
                store,
                clock,
                validity: Arc::new(ValidityCounter::starting_at(seed)),
                message_limit: RwLock::new(None),
            }),
            users: RwLock::new(BTreeMap::new()),
        }
    }

    /// Builds a backend from configuration, opening the configured store
    /// and provisioning configured users with an INBOX.
    pub fn from_config(cfg: &Config, clock: Arc<dyn Clock>) -> eyre::Result<Self> {
        cfg.validate()?;
        let store: Arc<dyn MessageStore> = match &cfg.store {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::Fs(dir) => Arc::new(
                FsStore::open(dir).map_err(|e| eyre!("Failed to open store at {}: {}", dir.display(), e))?,
            ),
        };
        let backend = Self::new(Settings::from(cfg), store, clock);
        backend.set_message_limit(cfg.append_limit)?;

        for name in &cfg.users {
            let user = backend.create_user(name)?;
            user.create_mailbox(INBOX)?;
        }
        info!("Backend ready with {} user(s)", cfg.users.len());
        Ok(backend)
    }

    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.shared.store
    }

    pub fn message_limit(&self) -> Result<Option<u32>> {
        self.shared.message_limit()
    }

    pub fn set_message_limit(&self, limit: Option<u32>) -> Result<()> {
        *self.shared.message_limit.write()? = limit;
        Ok(())
    }

    /// Creates a user with no mailboxes.
    pub fn create_user(&self, name: &str) -> Result<Arc<User>> {
        let mut users = self.users.write()?;
        if users.contains_key(name) {
            return Err(Error::UserExists);
        }
        let user = Arc::new(User::new(name, self.shared.clone()));
        users.insert(name.to_string(), user.clone());
        info!("Created user '{}'", name);
        Ok(user)
    }

    pub fn get_user(&self, name: &str) -> Result<Arc<User>> {
        self.users.read()?.get(name).cloned().ok_or(Error::NoSuchUser)
    }

    /// Removes the user and all of their mailboxes and content.
    pub fn delete_user(&self, name: &str) -> Result<()> {
        let user = self.users.write()?.remove(name).ok_or(Error::NoSuchUser)?;
        user.destroy()?;
        info!("Deleted user '{}'", name);
        Ok(())
    }

    pub fn list_users(&self) -> Result<Vec<String>> {
        Ok(self.users.read()?.keys().cloned().collect())
    }
}
