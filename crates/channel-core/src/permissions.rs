use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::user::UserSession;

/// Allow-list of usernames and role names for one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionRule(Vec<String>);

/// Permission rules keyed by command name.
pub type PermissionTable = HashMap<String, PermissionRule>;

impl PermissionRule {
    pub fn new<I, S>(principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(principals.into_iter().map(Into::into).collect())
    }

    /// Reads a rule payload as delivered by the config store.
    ///
    /// `null` means "no rule". Payloads that are neither a list nor a single
    /// principal become an empty rule, which nobody satisfies.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(principal) => Some(Self::new([principal.as_str()])),
            Value::Array(items) => Some(Self::new(items.iter().filter_map(Value::as_str))),
            Value::Bool(_) | Value::Number(_) | Value::Object(_) => {
                warn!(payload = %value, "Malformed permission rule; command locked");
                Some(Self::default())
            }
        }
    }

    pub fn principals(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, principal: &str) -> bool {
        self.0.iter().any(|p| p == principal)
    }
}

/// Decides whether `user` may run `command`.
///
/// Commands without a rule are open to everyone. Otherwise the user must be
/// listed by name or hold one of the listed roles.
#[must_use]
pub fn is_permitted(user: &UserSession, command: &str, table: &PermissionTable) -> bool {
    let Some(rule) = table.get(command) else {
        return true;
    };
    if rule.contains(&user.username) {
        return true;
    }
    rule.principals().any(|principal| user.has_role(principal))
}
