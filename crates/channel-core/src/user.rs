//! Per-user session state observed from chat messages.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// Role names that permission rules may refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RoleConfig {
    names: Vec<String>,
}

impl RoleConfig {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn recognizes(&self, role: &str) -> bool {
        self.names.iter().any(|name| name == role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// The user fields a transport attaches to each message.
///
/// Only `username` is required; unknown fields are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserDescriptor {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl UserDescriptor {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }
}

/// Everything known about one chatter in a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub username: String,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
    pub metadata: Map<String, Value>,
}

impl UserSession {
    fn new(username: &str) -> Self {
        Self {
            username: username.to_owned(),
            display_name: None,
            roles: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Merges the fields present in `descriptor`; absent fields keep their
    /// previous value.
    pub fn update(&mut self, descriptor: &UserDescriptor, roles: &RoleConfig) {
        if let Some(display_name) = &descriptor.display_name {
            self.display_name = Some(display_name.clone());
        }
        if let Some(incoming) = &descriptor.roles {
            self.roles = incoming
                .iter()
                .filter(|role| roles.recognizes(role))
                .cloned()
                .collect();
        }
        for (key, value) in &descriptor.extra {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    /// Name used when addressing the user in replies.
    #[must_use]
    pub fn mention_name(&self) -> String {
        let name = self.display_name.as_deref().unwrap_or(&self.username);
        format!("@{name}")
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

pub type SharedSession = Arc<RwLock<UserSession>>;

#[derive(Debug, Default)]
pub struct UserSessionCache {
    sessions: HashMap<String, SharedSession>,
    roles: RoleConfig,
}

impl UserSessionCache {
    #[must_use]
    pub fn new(roles: RoleConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            roles,
        }
    }

    /// Creates the session on first sight, merges into it afterwards.
    ///
    /// The returned handle is the same `Arc` for every call with the same
    /// username.
    pub async fn observe(&mut self, descriptor: &UserDescriptor) -> SharedSession {
        let session = self
            .sessions
            .entry(descriptor.username.clone())
            .or_insert_with(|| Arc::new(RwLock::new(UserSession::new(&descriptor.username))));
        session.write().await.update(descriptor, &self.roles);
        Arc::clone(session)
    }

    #[must_use]
    pub fn get(&self, username: &str) -> Option<SharedSession> {
        self.sessions.get(username).map(Arc::clone)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roles() -> RoleConfig {
        RoleConfig::new(["mods", "admins", "viewer"])
    }

    #[tokio::test]
    async fn first_message_creates_session() {
        let mut cache = UserSessionCache::new(roles());
        let session = cache
            .observe(&UserDescriptor::new("alice").with_roles(["viewer"]))
            .await;
        let s = session.read().await;
        assert_eq!(s.username, "alice");
        assert_eq!(s.roles, vec!["viewer".to_owned()]);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn later_messages_merge_into_same_session() {
        let mut cache = UserSessionCache::new(roles());
        let first = cache
            .observe(&UserDescriptor::new("alice").with_display_name("Alice"))
            .await;

        let mut second = UserDescriptor::new("alice").with_roles(["mods"]);
        second.extra.insert("color".to_owned(), json!("#ff0000"));
        let again = cache.observe(&second).await;

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.len(), 1);
        let s = first.read().await;
        assert_eq!(s.display_name.as_deref(), Some("Alice"));
        assert_eq!(s.roles, vec!["mods".to_owned()]);
        assert_eq!(s.metadata.get("color"), Some(&json!("#ff0000")));
    }

    #[tokio::test]
    async fn usernames_are_case_sensitive() {
        let mut cache = UserSessionCache::new(roles());
        cache.observe(&UserDescriptor::new("Alice")).await;
        cache.observe(&UserDescriptor::new("alice")).await;
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn unrecognized_roles_are_dropped() {
        let mut cache = UserSessionCache::new(roles());
        let session = cache
            .observe(&UserDescriptor::new("bob").with_roles(["mods", "wizard"]))
            .await;
        assert_eq!(session.read().await.roles, vec!["mods".to_owned()]);
    }

    #[test]
    fn mention_prefers_display_name() {
        let mut session = UserSession::new("carol");
        assert_eq!(session.mention_name(), "@carol");
        session.update(&UserDescriptor::new("carol").with_display_name("Carol"), &roles());
        assert_eq!(session.mention_name(), "@Carol");
    }

    #[test]
    fn descriptor_keeps_unknown_fields() {
        let descriptor: UserDescriptor = serde_json::from_value(json!({
            "username": "dave",
            "badges": {"subscriber": "12"},
        }))
        .unwrap();
        assert_eq!(descriptor.username, "dave");
        assert!(descriptor.roles.is_none());
        assert!(descriptor.extra.contains_key("badges"));
    }
}
