use std::collections::HashMap;
use std::sync::RwLock;

use crate::bot::user::User;

/// What kind of conversation a destination is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Channel,
    Group,
    Direct,
}

/// The addressable target for a command's effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Platform-specific conversation ID
    pub id: String,
    pub kind: DestinationKind,
    /// Human-readable name (channel name, or the counterpart for a DM)
    pub name: String,
}

impl Destination {
    pub fn new(id: impl Into<String>, kind: DestinationKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
        }
    }
}

/// A destination paired with the user acting there. Interactive commands are
/// tracked under this pairing for their whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDestination {
    pub destination: Destination,
    pub user: User,
}

impl UserDestination {
    pub fn new(destination: Destination, user: User) -> Self {
        Self { destination, user }
    }

    /// Map key identifying this user-in-destination pairing.
    pub fn key(&self) -> String {
        format!("{}:{}", self.destination.id, self.user.id)
    }
}

#[derive(Default)]
struct RosterInner {
    users: HashMap<String, User>,
    destinations: HashMap<String, Destination>,
}

/// Read-shared registry of known users and destinations.
///
/// Populated at startup from the platform and refreshed externally; the
/// engine only performs lookups. Reads are concurrent, writes happen outside
/// command processing.
#[derive(Default)]
pub struct Roster {
    inner: RwLock<RosterInner>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.inner.write().unwrap().users.insert(user.id.clone(), user);
    }

    pub fn insert_destination(&self, destination: Destination) {
        self.inner
            .write()
            .unwrap()
            .destinations
            .insert(destination.id.clone(), destination);
    }

    pub fn user(&self, id: &str) -> Option<User> {
        self.inner.read().unwrap().users.get(id).cloned()
    }

    /// Look a user up by handle or display name, case-insensitively.
    pub fn user_named(&self, name: &str) -> Option<User> {
        let inner = self.inner.read().unwrap();
        inner
            .users
            .values()
            .find(|u| {
                u.name.eq_ignore_ascii_case(name)
                    || u.real_name
                        .as_deref()
                        .is_some_and(|rn| rn.eq_ignore_ascii_case(name))
            })
            .cloned()
    }

    pub fn destination(&self, id: &str) -> Option<Destination> {
        self.inner.read().unwrap().destinations.get(id).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.inner.read().unwrap().users.len()
    }

    pub fn destination_count(&self) -> usize {
        self.inner.read().unwrap().destinations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_lookup_by_name_is_case_insensitive() {
        let roster = Roster::new();
        let mut alice = User::new("U1", "alice");
        alice.real_name = Some("Alice Liddell".to_string());
        roster.insert_user(alice);

        assert_eq!(roster.user_named("Alice").map(|u| u.id), Some("U1".into()));
        assert_eq!(
            roster.user_named("alice liddell").map(|u| u.id),
            Some("U1".into())
        );
        assert!(roster.user_named("bob").is_none());
    }

    #[test]
    fn test_user_destination_key_pairs_destination_and_user() {
        let ud = UserDestination::new(
            Destination::new("C1", DestinationKind::Channel, "general"),
            User::new("U1", "alice"),
        );
        assert_eq!(ud.key(), "C1:U1");
    }
}
