//! Token service — single-use invitation tokens and short-lived
//! transport tokens.
//!
//! Invitation tokens are opaque random strings scoped to one session;
//! single use is enforced by the store's atomic check-and-consume, not
//! here. Transport tokens are HS256 JWTs asserting a user identity only,
//! verifiable by any process holding the shared signing secret — they
//! carry no session-specific authorization.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::store::InvitationRecord;

/// Length of the opaque invitation token material.
const INVITATION_TOKEN_LEN: usize = 32;

/// Why a token was rejected. Each case is machine-distinguishable so the
/// boundary can report a precise reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invitation token not found")]
    NotFound,

    #[error("invitation token already used")]
    AlreadyUsed,

    #[error("invitation token expired")]
    Expired,

    #[error("invitation token is bound to another session")]
    SessionMismatch,

    #[error("cannot redeem an invitation to your own session")]
    SelfInvitation,

    #[error("debater seat already taken by {0}")]
    SeatTaken(String),

    #[error("transport token rejected: {0}")]
    TransportRejected(String),
}

impl TokenError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "TOKEN_NOT_FOUND",
            Self::AlreadyUsed => "TOKEN_USED",
            Self::Expired => "TOKEN_EXPIRED",
            Self::SessionMismatch => "TOKEN_SESSION_MISMATCH",
            Self::SelfInvitation => "TOKEN_SELF_INVITE",
            Self::SeatTaken(_) => "SEAT_TAKEN",
            Self::TransportRejected(_) => "TRANSPORT_REJECTED",
        }
    }
}

/// JWT claims for a transport token: user identity and validity window,
/// nothing else.
#[derive(Debug, Serialize, Deserialize)]
struct TransportClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies both token kinds. Cheap to clone; every holder
/// shares the same signing secret.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    invitation_ttl: Duration,
    transport_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: String, invitation_ttl: Duration, transport_ttl: Duration) -> Self {
        Self {
            secret,
            invitation_ttl,
            transport_ttl,
        }
    }

    /// Mint a fresh invitation for `session_id`. Previously issued unused
    /// invitations stay valid until their own expiry; only redemption is
    /// single-use.
    pub fn mint_invitation(&self, session_id: &str) -> InvitationRecord {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(INVITATION_TOKEN_LEN)
            .map(char::from)
            .collect();
        let now = Utc::now();
        InvitationRecord {
            token,
            session_id: session_id.to_string(),
            issued_at: now,
            expires_at: now + self.invitation_ttl,
            used: false,
        }
    }

    /// Issue a signed transport token for `user_id`, valid for the
    /// configured TTL.
    pub fn issue_transport_token(&self, user_id: &str) -> Result<String, TokenError> {
        self.issue_transport_token_at(user_id, Utc::now())
    }

    /// Issue with an explicit clock, for deterministic expiry tests.
    pub fn issue_transport_token_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = TransportClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.transport_ttl).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TokenError::TransportRejected(e.to_string()))
    }

    /// Verify a transport token and return the asserted user identity.
    pub fn verify_transport_token(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<TransportClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| TokenError::TransportRejected(e.to_string()))?;
        Ok(data.claims.sub)
    }
}
