use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

// Low cost keeps seeding and logins fast; this server only ever holds demo users.
const HASH_COST: u32 = 4;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, HASH_COST)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub sub: String, // username
    pub exp: usize,
    /// Revocation epoch the token was issued in.
    pub epoch: u64,
}

pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn issue(&self, username: &str, epoch: u64) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: username.to_owned(),
            exp: (Utc::now() + self.ttl).timestamp().max(0) as usize,
            epoch,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
    }

    pub fn validate(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hashed = hash_password("secret").unwrap();
        assert!(verify_password("secret", &hashed));
        assert!(!verify_password("wrong", &hashed));
        assert!(!verify_password("secret", "not-a-hash"));
    }

    #[test]
    fn tokens_are_bound_to_their_secret() {
        let signer = TokenSigner::new("k1", Duration::minutes(5));
        let token = signer.issue("admin@corpus.com", 3).unwrap();
        let claims = signer.validate(&token).unwrap();
        assert_eq!(claims.sub, "admin@corpus.com");
        assert_eq!(claims.epoch, 3);

        let other = TokenSigner::new("k2", Duration::minutes(5));
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let signer = TokenSigner::new("k", Duration::minutes(-10));
        let token = signer.issue("a", 0).unwrap();
        assert!(signer.validate(&token).is_err());
    }
}
