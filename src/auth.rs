//! Password hashing, login sessions and the default admin account

use crate::error::{BankError, BankResult};
use crate::store::Store;
use crate::types::{NewUser, User};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;
use uuid::Uuid;

pub use bcrypt::DEFAULT_COST;

pub fn hash_password(password: &str, cost: u32) -> BankResult<String> {
    if password.is_empty() {
        return Err(BankError::Validation("Password cannot be empty".to_string()));
    }
    bcrypt::hash(password, cost).map_err(|e| BankError::Password(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Look up a user by name and check the password
pub fn authenticate(store: &Store, username: &str, password: &str) -> BankResult<User> {
    check_credentials(store.find_user_by_username(username)?, password)
}

/// Check a password against an already fetched account.
///
/// Unknown users and wrong passwords give the same error.
pub fn check_credentials(user: Option<User>, password: &str) -> BankResult<User> {
    match user {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        _ => Err(BankError::Validation(
            "Invalid username or password".to_string(),
        )),
    }
}

/// Credentials of the account created on first start
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for AdminAccount {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password: "admin123".to_string(),
        }
    }
}

/// Create the admin account unless a user with that name already exists.
/// Returns `true` when an account was created.
pub fn ensure_admin_user(store: &mut Store, admin: &AdminAccount, cost: u32) -> BankResult<bool> {
    if store.find_user_by_username(&admin.username)?.is_some() {
        return Ok(false);
    }
    store.create_user(&NewUser {
        username: admin.username.clone(),
        email: admin.email.clone(),
        password_hash: hash_password(&admin.password, cost)?,
        is_admin: true,
    })?;
    info!(username = %admin.username, "created default admin account");
    Ok(true)
}

/// How long a login session stays valid
pub const SESSION_TTL_HOURS: i64 = 24;

struct Session {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// In-memory table of login sessions: token → user id, with expiry
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(Duration::hours(SESSION_TTL_HOURS))
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Lifetime of new sessions, in seconds (cookie `Max-Age`)
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds().max(0)
    }

    /// Start a session and return its token. Expired sessions are pruned.
    pub fn create(&self, user_id: i64) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.retain(|_, session| !session.is_expired(now));
        sessions.insert(
            token.clone(),
            Session {
                user_id,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// User behind a live token. An expired token is removed.
    pub fn user_id(&self, token: &str) -> Option<i64> {
        let now = Utc::now();
        {
            let sessions = self
                .sessions
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match sessions.get(token) {
                None => return None,
                Some(session) if !session.is_expired(now) => return Some(session.user_id),
                Some(_) => {}
            }
        }
        self.remove(token);
        None
    }

    pub fn remove(&self, token: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(token)
            .is_some()
    }

    /// Drop every session of a user (account deleted)
    pub fn remove_user(&self, user_id: i64) {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|_, session| session.user_id != user_id);
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("secret-pass", TEST_COST).unwrap();
        assert_ne!(hash, "secret-pass");
        assert!(verify_password("secret-pass", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("secret-pass", "not a bcrypt hash"));
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(hash_password("", TEST_COST).is_err());
    }

    #[test]
    fn test_ensure_admin_user_is_idempotent() {
        let mut store = Store::open_in_memory().unwrap();
        let admin = AdminAccount::default();

        assert!(ensure_admin_user(&mut store, &admin, TEST_COST).unwrap());
        assert!(!ensure_admin_user(&mut store, &admin, TEST_COST).unwrap());
        assert_eq!(store.count_users().unwrap(), 1);

        let user = authenticate(&store, "admin", "admin123").unwrap();
        assert!(user.is_admin);
        assert!(authenticate(&store, "admin", "nope").is_err());
        assert!(authenticate(&store, "ghost", "admin123").is_err());
    }

    #[test]
    fn test_session_lifecycle() {
        let sessions = SessionStore::new();
        let token = sessions.create(7);
        let other = sessions.create(7);
        assert_ne!(token, other);
        assert_eq!(sessions.user_id(&token), Some(7));

        assert!(sessions.remove(&token));
        assert_eq!(sessions.user_id(&token), None);

        sessions.remove_user(7);
        assert_eq!(sessions.user_id(&other), None);
    }

    #[test]
    fn test_expired_session_is_rejected_and_pruned() {
        let sessions = SessionStore::with_ttl(Duration::seconds(-1));
        let token = sessions.create(3);
        assert_eq!(sessions.len(), 1);

        assert_eq!(sessions.user_id(&token), None);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_create_prunes_expired_sessions() {
        let sessions = SessionStore::with_ttl(Duration::seconds(-1));
        sessions.create(1);
        sessions.create(2);
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_default_session_lifetime() {
        let sessions = SessionStore::new();
        assert_eq!(sessions.ttl_seconds(), SESSION_TTL_HOURS * 3600);
        let token = sessions.create(9);
        assert_eq!(sessions.user_id(&token), Some(9));
    }

    #[test]
    fn test_check_credentials() {
        let mut store = Store::open_in_memory().unwrap();
        ensure_admin_user(&mut store, &AdminAccount::default(), TEST_COST).unwrap();

        let found = store.find_user_by_username("admin").unwrap();
        assert!(check_credentials(found.clone(), "admin123").is_ok());
        assert!(check_credentials(found, "wrong").is_err());

        let err = check_credentials(None, "admin123").unwrap_err();
        assert_eq!(err.to_string(), "Invalid username or password");
    }
}
