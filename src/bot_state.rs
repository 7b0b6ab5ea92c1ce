use std::collections::HashMap;
use std::sync::Arc;

use teloxide::types::UserId;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::config::Config;
use crate::gcal::CalendarClient;
use crate::models::{Conversation, UserProfile};
use crate::schedule::policy::CalendarPolicy;
use crate::schedule::ScheduleBook;

/// Shared state injected into every handler through dptree. The schedule
/// book sits behind one mutex: claiming a slot and recording the
/// appointment happen in a single critical section, and the lock is always
/// released before any collaborator call.
#[derive(Clone)]
pub struct BotState {
    pub config: Arc<Config>,
    pub policy: Arc<CalendarPolicy>,
    pub calendar: Option<Arc<CalendarClient>>,
    users: Arc<RwLock<HashMap<UserId, UserProfile>>>,
    sessions: Arc<RwLock<HashMap<UserId, Conversation>>>,
    schedule: Arc<Mutex<ScheduleBook>>,
}

impl BotState {
    pub fn new(config: Config) -> Self {
        let policy = Arc::new(CalendarPolicy::new(config.tz));
        let calendar = config
            .gcal
            .clone()
            .map(|cfg| Arc::new(CalendarClient::new(cfg)));
        Self {
            config: Arc::new(config),
            policy,
            calendar,
            users: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            schedule: Arc::new(Mutex::new(ScheduleBook::new())),
        }
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.config.admin_ids.contains(&user_id.0)
    }

    pub async fn is_registered(&self, user_id: UserId) -> bool {
        self.users.read().await.contains_key(&user_id)
    }

    pub async fn user(&self, user_id: UserId) -> Option<UserProfile> {
        self.users.read().await.get(&user_id).cloned()
    }

    /// Commits a registration. A repeated registration replaces the profile
    /// wholesale; profiles are never edited field by field.
    pub async fn insert_user(&self, user_id: UserId, profile: UserProfile) {
        self.users.write().await.insert(user_id, profile);
    }

    pub async fn session(&self, user_id: UserId) -> Option<Conversation> {
        self.sessions.read().await.get(&user_id).cloned()
    }

    /// One live session per user: whatever was active is replaced.
    pub async fn set_session(&self, user_id: UserId, conv: Conversation) {
        self.sessions.write().await.insert(user_id, conv);
    }

    pub async fn clear_session(&self, user_id: UserId) {
        self.sessions.write().await.remove(&user_id);
    }

    pub async fn schedule(&self) -> MutexGuard<'_, ScheduleBook> {
        self.schedule.lock().await
    }
}
