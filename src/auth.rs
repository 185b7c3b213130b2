//! Session tokens and password hashing.
//!
//! Tokens are `<claims>.<signature>`, both base64url without padding. The
//! claims are JSON `{sub, role, exp}` and the signature is HMAC-SHA256 over the
//! encoded claims.

use crate::models::Role;
use crate::{Error, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Fixed token for the demo QA account.
pub const DEMO_QA_TOKEN: &str = "demo-qa-token";

/// Fixed token for the demo DEV account.
pub const DEMO_DEV_TOKEN: &str = "demo-dev-token";

/// User ID and username of the demo QA account.
pub const DEMO_QA_USER: &str = "demo-qa";

/// User ID and username of the demo DEV account.
pub const DEMO_DEV_USER: &str = "demo-dev";

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: String, role: Role) -> Self {
        Self { user_id, role }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    exp: i64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
    demo_tokens: bool,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_hours: u64, demo_tokens: bool) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::hours(ttl_hours as i64),
            demo_tokens,
        }
    }

    pub fn demo_tokens(&self) -> bool {
        self.demo_tokens
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Config(format!("token secret: {}", e)))
    }

    /// Issue a token for `identity`.
    pub fn issue(&self, identity: &Identity) -> Result<String> {
        let claims = Claims {
            sub: identity.user_id.clone(),
            role: identity.role,
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload, signature))
    }

    /// Verify a token and return the identity it carries.
    pub fn verify(&self, token: &str) -> Result<Identity> {
        if self.demo_tokens {
            match token {
                DEMO_QA_TOKEN => return Ok(Identity::new(DEMO_QA_USER.to_string(), Role::Qa)),
                DEMO_DEV_TOKEN => return Ok(Identity::new(DEMO_DEV_USER.to_string(), Role::Dev)),
                _ => {}
            }
        }

        let invalid = || Error::Unauthorized("Invalid token".to_string());

        let (payload, signature) = token.split_once('.').ok_or_else(invalid)?;
        let expected = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&expected).map_err(|_| invalid())?;

        let bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
        let claims: Claims = serde_json::from_slice(&bytes).map_err(|_| invalid())?;

        if claims.exp < Utc::now().timestamp() {
            return Err(Error::Unauthorized("Token expired".to_string()));
        }

        Ok(Identity::new(claims.sub, claims.role))
    }
}

/// Password hashing seam.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;

    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id hashes in PHC string form (`$argon2id$v=19$...`).
#[derive(Debug, Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2PasswordHasher {
    /// Custom cost: memory in KiB and number of passes. Out-of-range values
    /// fall back to the argon2 defaults.
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Self {
        let params = Params::new(memory_kib, iterations, 1, None).unwrap_or_default();
        Self { params }
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Other(format!("password hash: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        // cost parameters come from the stored hash
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
