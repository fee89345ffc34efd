//! The marketplace service.
//!
//! This is the single entry point the transport layer talks to. It is
//! responsible for:
//! 1.  Validating and normalizing input (stall attributes, variety lists,
//!     registrations).
//! 2.  Running every mutation through the Authorization Gate before it
//!     reaches the store.
//! 3.  Deriving the Latest-Stock Projection for public readers.

use crate::crypto::{hash_password, verify_password, TokenCodec};
use crate::domain::{
    validate_varieties, AuthGate, Identity, NewUser, Position, Registration, Requirement,
    StallDraft, StallFilter, StallId, StallListing, StallRecord, StockUpdate, UpdateId, User,
    VarietyDraft,
};
use crate::error::{MarketError, MarketResult};
use crate::infra::config::Config;
use crate::storage::{MarketStore, MigrationReport};
use futures::TryStreamExt;
use std::sync::Arc;

/// Admin login pair. The admin is not a row in `users`; only an argon2 hash
/// of the configured password is kept. An empty password disables admin login.
#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password_hash: Option<String>,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: &str) -> MarketResult<Self> {
        let password_hash = if password.is_empty() {
            None
        } else {
            Some(hash_password(password)?)
        };
        Ok(Self {
            username: username.into(),
            password_hash,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password is always checked, even when the username is wrong.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Some(hash) = self.password_hash.as_deref() else {
            return false;
        };
        let password_ok = verify_password(password, hash);
        password_ok && username == self.username
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("enabled", &self.password_hash.is_some())
            .finish_non_exhaustive()
    }
}

/// Result of a successful registration or login.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

pub struct MarketService {
    store: Arc<dyn MarketStore>,
    gate: AuthGate,
    admin: AdminCredentials,
    fallback: Position,
}

impl MarketService {
    pub fn new(
        store: Arc<dyn MarketStore>,
        codec: TokenCodec,
        admin: AdminCredentials,
        fallback: Position,
    ) -> Self {
        Self {
            store,
            gate: AuthGate::new(codec),
            admin,
            fallback,
        }
    }

    pub fn from_config(store: Arc<dyn MarketStore>, config: &Config) -> MarketResult<Self> {
        let codec = TokenCodec::new(
            &config.jwt_secret,
            config.admin_token_ttl,
            config.user_token_ttl,
        );
        let admin = AdminCredentials::new(config.admin_username.clone(), &config.admin_password)?;
        Ok(Self::new(store, codec, admin, config.fallback_position))
    }

    pub fn store(&self) -> &Arc<dyn MarketStore> {
        &self.store
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub async fn ping(&self) -> MarketResult<()> {
        self.store.ping().await
    }

    // ---------------------------------------------------------------------
    // Public reads (no gate)
    // ---------------------------------------------------------------------

    /// Every stall with its latest stock, filtered while streaming.
    pub async fn list_stalls(&self, filter: &StallFilter) -> MarketResult<Vec<StallListing>> {
        let fallback = self.fallback;
        self.store
            .stream_stalls()
            .map_ok(|(stall, latest)| StallListing::project(stall, latest, fallback))
            .try_filter(|listing| futures::future::ready(filter.matches(listing)))
            .try_collect()
            .await
    }

    pub async fn get_stall(&self, id: StallId) -> MarketResult<StallListing> {
        let stall = self
            .store
            .stall(id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("stall {}", id)))?;
        let latest = self.store.latest_update_for(id).await?;
        Ok(StallListing::project(stall, latest, self.fallback))
    }

    pub async fn latest_update_for(&self, id: StallId) -> MarketResult<Option<StockUpdate>> {
        self.store.latest_update_for(id).await
    }

    // ---------------------------------------------------------------------
    // Accounts
    // ---------------------------------------------------------------------

    /// Creates the owner account and its stall atomically and signs the
    /// caller in.
    pub async fn register(&self, registration: Registration) -> MarketResult<Session> {
        let registration = registration.normalized()?;
        if self
            .store
            .credentials_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(MarketError::Conflict(
                "a user with this email already exists".into(),
            ));
        }

        let new_user = NewUser {
            name: registration.name,
            email: registration.email,
            password_hash: hash_password(&registration.password)?,
            phone: registration.phone,
        };
        let (user, stall_id) = self.store.register(&new_user, &registration.stall).await?;
        tracing::info!(user_id = user.id, stall_id, "registered stall owner");

        let token = self.gate.codec().issue_user(user.id, &user.email)?;
        Ok(Session { token, user })
    }

    pub async fn login(&self, email: &str, password: &str) -> MarketResult<Session> {
        let email = crate::domain::user::normalize_email(email);
        let credentials = self
            .store
            .credentials_by_email(&email)
            .await?
            .ok_or(MarketError::Unauthenticated)?;
        if !verify_password(password, &credentials.password_hash) {
            tracing::debug!(user_id = credentials.user.id, "login rejected: bad password");
            return Err(MarketError::Unauthenticated);
        }
        let user = credentials.user;
        let token = self.gate.codec().issue_user(user.id, &user.email)?;
        Ok(Session { token, user })
    }

    pub fn admin_login(&self, username: &str, password: &str) -> MarketResult<String> {
        if !self.admin.verify(username, password) {
            tracing::warn!("admin login rejected");
            return Err(MarketError::Unauthenticated);
        }
        self.gate.codec().issue_admin(self.admin.username())
    }

    /// The user behind a token.
    pub async fn me(&self, token: Option<&str>) -> MarketResult<User> {
        let user_id = self.owner_id(token)?;
        self.store
            .user(user_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("user {}", user_id)))
    }

    // ---------------------------------------------------------------------
    // Owner operations
    // ---------------------------------------------------------------------

    pub async fn my_stall(&self, token: Option<&str>) -> MarketResult<StallListing> {
        let owner_id = self.owner_id(token)?;
        let stall = self
            .store
            .stall_by_owner(owner_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("no stall for this user".into()))?;
        let latest = self.store.latest_update_for(stall.id).await?;
        Ok(StallListing::project(stall, latest, self.fallback))
    }

    /// Full replace of a stall's attributes by its owner or an admin.
    pub async fn update_stall(
        &self,
        token: Option<&str>,
        stall_id: StallId,
        draft: StallDraft,
    ) -> MarketResult<()> {
        let identity = self.gate.authenticate(token)?;
        let stall = self
            .store
            .stall(stall_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("stall {}", stall_id)))?;
        identity.require(Requirement::OwnerOf(stall.owner_id))?;

        let draft = draft.normalized()?;
        self.store.update_stall(stall_id, &draft, None).await?;
        tracing::info!(stall_id, by = ?identity, "stall info updated");
        Ok(())
    }

    pub async fn update_my_stall(&self, token: Option<&str>, draft: StallDraft) -> MarketResult<()> {
        let owner_id = self.owner_id(token)?;
        let stall = self
            .store
            .stall_by_owner(owner_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("no stall for this user".into()))?;
        let draft = draft.normalized()?;
        self.store.update_stall(stall.id, &draft, None).await?;
        tracing::info!(stall_id = stall.id, owner_id, "stall info updated by owner");
        Ok(())
    }

    /// Appends a stock snapshot to the caller's own stall.
    pub async fn post_stock_update(
        &self,
        token: Option<&str>,
        varieties: Vec<VarietyDraft>,
    ) -> MarketResult<UpdateId> {
        let owner_id = self.owner_id(token)?;
        let varieties = validate_varieties(varieties)?;
        let stall = self
            .store
            .stall_by_owner(owner_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("no stall for this user".into()))?;
        let id = self.store.append_update(stall.id, &varieties).await?;
        tracing::info!(stall_id = stall.id, update_id = id, count = varieties.len(), "stock updated");
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Admin operations
    // ---------------------------------------------------------------------

    pub async fn admin_create_stall(
        &self,
        token: Option<&str>,
        draft: StallDraft,
        varieties: Option<Vec<VarietyDraft>>,
    ) -> MarketResult<StallId> {
        self.gate.authorize(token, Requirement::Admin)?;
        let draft = draft.normalized()?;
        let varieties = non_empty(varieties).map(validate_varieties).transpose()?;
        let id = self
            .store
            .create_stall(&draft, None, varieties.as_deref())
            .await?;
        tracing::info!(stall_id = id, "stall created by admin");
        Ok(id)
    }

    /// Full replace of a stall plus, when varieties are given, a new stock
    /// update, atomically.
    pub async fn admin_edit_stall(
        &self,
        token: Option<&str>,
        stall_id: StallId,
        draft: StallDraft,
        varieties: Option<Vec<VarietyDraft>>,
    ) -> MarketResult<()> {
        self.gate.authorize(token, Requirement::Admin)?;
        let draft = draft.normalized()?;
        let varieties = non_empty(varieties).map(validate_varieties).transpose()?;
        self.store
            .update_stall(stall_id, &draft, varieties.as_deref())
            .await?;
        tracing::info!(stall_id, "stall edited by admin");
        Ok(())
    }

    /// Idempotent: deleting a missing stall reports zero rows, not an error.
    pub async fn admin_delete_stall(&self, token: Option<&str>, stall_id: StallId) -> MarketResult<u64> {
        self.gate.authorize(token, Requirement::Admin)?;
        let removed = self.store.delete_stall(stall_id).await?;
        tracing::info!(stall_id, removed, "stall deleted by admin");
        Ok(removed)
    }

    /// All stalls with raw coordinates and owner ids.
    pub async fn admin_list_stalls(&self, token: Option<&str>) -> MarketResult<Vec<StallRecord>> {
        self.gate.authorize(token, Requirement::Admin)?;
        self.store
            .stream_stalls()
            .map_ok(|(stall, latest_update)| StallRecord {
                stall,
                latest_update,
            })
            .try_collect()
            .await
    }

    pub async fn migrate(&self, token: Option<&str>) -> MarketResult<MigrationReport> {
        self.gate.authorize(token, Requirement::Admin)?;
        self.store.migrate().await
    }

    /// Inserts the demo stall when the directory is empty. Returns whether
    /// anything was inserted.
    pub async fn seed_sample_data(&self) -> MarketResult<bool> {
        if self.store.count_stalls().await? > 0 {
            tracing::info!("sample data skipped: directory is not empty");
            return Ok(false);
        }
        let draft = StallDraft {
            name: "Durian King Stall".into(),
            address: "Jalan Sultan, Kuala Lumpur".into(),
            state: Some("Kuala Lumpur".into()),
            latitude: None,
            longitude: None,
            phone: Some("+60 12-345 6789".into()),
        };
        let varieties = validate_varieties(vec![
            VarietyDraft::new("Musang King", Some(45.0), "high"),
            VarietyDraft::new("Black Thorn", Some(35.0), "medium"),
            VarietyDraft::new("D24 Sultan", Some(25.0), "low"),
        ])?;
        let id = self.store.create_stall(&draft, None, Some(varieties.as_slice())).await?;
        tracing::info!(stall_id = id, "sample data inserted");
        Ok(true)
    }

    fn owner_id(&self, token: Option<&str>) -> MarketResult<i64> {
        let identity = self.gate.authorize(token, Requirement::User)?;
        match identity {
            Identity::User { user_id, .. } => Ok(user_id),
            Identity::Admin { .. } => Err(MarketError::Forbidden(
                "a stall owner account is required".into(),
            )),
        }
    }
}

/// Absent and empty variety lists both mean "no new stock update".
fn non_empty(varieties: Option<Vec<VarietyDraft>>) -> Option<Vec<VarietyDraft>> {
    varieties.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_credentials_hold_only_a_hash() {
        let admin = AdminCredentials::new("admin", "durian-admin").unwrap();
        assert!(admin
            .password_hash
            .as_deref()
            .is_some_and(|h| h.starts_with("$argon2")));
        assert!(admin.verify("admin", "durian-admin"));
        assert!(!admin.verify("admin", "durian-admin "));
        assert!(!admin.verify("root", "durian-admin"));
        assert!(!format!("{:?}", admin).contains("durian-admin"));
    }

    #[test]
    fn empty_admin_password_disables_login() {
        let admin = AdminCredentials::new("admin", "").unwrap();
        assert!(!admin.verify("admin", ""));
    }
}
