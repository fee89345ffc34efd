//! Authorization Gate.
//!
//! A stateless predicate over a bearer token: it verifies the token with the
//! shared secret and checks the decoded identity against a [`Requirement`].
//! It performs no I/O. Every mutating operation goes through it first;
//! public directory reads never do.

use crate::crypto::token::{Claims, Role, TokenCodec};
use crate::domain::user::UserId;
use crate::error::{MarketError, MarketResult};

/// Who a valid token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Admin { username: String },
    User { user_id: UserId, email: String },
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        matches!(self, Identity::Admin { .. })
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Identity::User { user_id, .. } => Some(*user_id),
            Identity::Admin { .. } => None,
        }
    }

    fn from_claims(claims: Claims) -> MarketResult<Self> {
        match claims.role {
            Role::Admin => Ok(Identity::Admin {
                username: claims.sub,
            }),
            Role::User => {
                let user_id = claims
                    .sub
                    .parse::<UserId>()
                    .map_err(|_| MarketError::InvalidToken)?;
                Ok(Identity::User {
                    user_id,
                    email: claims.email.unwrap_or_default(),
                })
            }
        }
    }

    /// Checks this identity against `requirement`.
    pub fn require(&self, requirement: Requirement) -> MarketResult<()> {
        match (requirement, self) {
            (Requirement::Any, _) => Ok(()),
            (Requirement::Admin, Identity::Admin { .. }) => Ok(()),
            (Requirement::Admin, Identity::User { .. }) => {
                Err(MarketError::Forbidden("admin role required".into()))
            }
            (Requirement::User, Identity::User { .. }) => Ok(()),
            (Requirement::User, Identity::Admin { .. }) => {
                Err(MarketError::Forbidden("a stall owner account is required".into()))
            }
            (Requirement::OwnerOf(_), Identity::Admin { .. }) => Ok(()),
            (Requirement::OwnerOf(owner), Identity::User { user_id, .. }) => {
                if owner == Some(*user_id) {
                    Ok(())
                } else {
                    Err(MarketError::Forbidden("stall is owned by another user".into()))
                }
            }
        }
    }
}

/// What an operation needs from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Any valid token.
    Any,
    Admin,
    /// A plain user (stall owner) token.
    User,
    /// The owner of a stall with this owner id, or an admin. Unowned stalls
    /// are admin-only.
    OwnerOf(Option<UserId>),
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    codec: TokenCodec,
}

impl AuthGate {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Verifies the token: `Unauthenticated` when absent, `InvalidToken` when
    /// the signature, format or expiry check fails.
    pub fn authenticate(&self, token: Option<&str>) -> MarketResult<Identity> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(MarketError::Unauthenticated)?;
        let claims = self.codec.verify(token).map_err(|e| {
            tracing::debug!("token rejected: {}", e);
            MarketError::InvalidToken
        })?;
        Identity::from_claims(claims)
    }

    pub fn authorize(
        &self,
        token: Option<&str>,
        requirement: Requirement,
    ) -> MarketResult<Identity> {
        let identity = self.authenticate(token)?;
        identity.require(requirement)?;
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn gate() -> AuthGate {
        AuthGate::new(TokenCodec::new(
            "test-secret",
            Duration::hours(2),
            Duration::days(7),
        ))
    }

    #[test]
    fn missing_token_is_unauthenticated() {
        let gate = gate();
        assert!(matches!(
            gate.authorize(None, Requirement::Any),
            Err(MarketError::Unauthenticated)
        ));
        assert!(matches!(
            gate.authorize(Some("  "), Requirement::Admin),
            Err(MarketError::Unauthenticated)
        ));
    }

    #[test]
    fn garbled_token_is_invalid() {
        assert!(matches!(
            gate().authorize(Some("garbage"), Requirement::Any),
            Err(MarketError::InvalidToken)
        ));
    }

    #[test]
    fn owner_match_is_required_for_user_tokens() {
        let gate = gate();
        let token = gate.codec().issue_user(5, "five@example.com").unwrap();

        assert!(matches!(
            gate.authorize(Some(&token), Requirement::OwnerOf(Some(7))),
            Err(MarketError::Forbidden(_))
        ));
        assert!(matches!(
            gate.authorize(Some(&token), Requirement::OwnerOf(None)),
            Err(MarketError::Forbidden(_))
        ));
        let identity = gate
            .authorize(Some(&token), Requirement::OwnerOf(Some(5)))
            .unwrap();
        assert_eq!(identity.user_id(), Some(5));
    }

    #[test]
    fn user_token_is_forbidden_for_admin_operations() {
        let gate = gate();
        let token = gate.codec().issue_user(5, "five@example.com").unwrap();
        assert!(matches!(
            gate.authorize(Some(&token), Requirement::Admin),
            Err(MarketError::Forbidden(_))
        ));
    }

    #[test]
    fn admin_bypasses_ownership_but_is_not_an_owner() {
        let gate = gate();
        let token = gate.codec().issue_admin("admin").unwrap();
        let identity = gate
            .authorize(Some(&token), Requirement::OwnerOf(Some(7)))
            .unwrap();
        assert!(identity.is_admin());
        assert!(gate.authorize(Some(&token), Requirement::OwnerOf(None)).is_ok());
        assert!(matches!(
            gate.authorize(Some(&token), Requirement::User),
            Err(MarketError::Forbidden(_))
        ));
    }

    #[test]
    fn expired_admin_token_is_invalid_not_forbidden() {
        let gate = gate();
        let token = gate
            .codec()
            .issue_admin_at("admin", Utc::now() - Duration::hours(5))
            .unwrap();
        assert!(matches!(
            gate.authorize(Some(&token), Requirement::Admin),
            Err(MarketError::InvalidToken)
        ));
    }
}
