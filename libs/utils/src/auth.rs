//! Generic JWS verification on top of `jsonwebtoken`.
//!
//! This module knows nothing about the shape of the claims a caller cares
//! about; callers pick the target type via `JwtAuth::decode::<T>`, the same
//! way the claims struct is generic in the original service's token
//! validator.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token signature is invalid")]
    Signature,
    #[error("token has expired")]
    Expired,
}

/// Verifies JWS tokens against a single signing public key.
///
/// Work-order tokens in this ecosystem are signed with an elliptic-curve
/// key (ES256); `from_ec_pem` is the expected construction path, but any
/// `jsonwebtoken`-supported algorithm can be plugged in via `new`.
pub struct JwtAuth {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuth {
    pub fn new(decoding_key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        // work-order tokens carry only the claims this service cares about;
        // the rest of the standard claim set is intentionally not required.
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        JwtAuth {
            decoding_key,
            validation,
        }
    }

    /// Builds a validator from a PEM-encoded EC public key, the key type
    /// used by the GA4GH work-order tokens this service consumes.
    pub fn from_ec_pem(pem: &[u8]) -> anyhow::Result<Self> {
        let decoding_key = DecodingKey::from_ec_pem(pem)?;
        Ok(Self::new(decoding_key, Algorithm::ES256))
    }

    /// Wraps a bare (non-PEM) public key body, as handed out by services
    /// that store just the base64 key material without armor.
    pub fn from_ec_pem_unwrapped(key_body: &str) -> anyhow::Result<Self> {
        let wrapped = format!(
            "-----BEGIN PUBLIC KEY-----\n{key_body}\n-----END PUBLIC KEY-----\n"
        );
        Self::from_ec_pem(wrapped.as_bytes())
    }

    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        let data = jsonwebtoken::decode::<T>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::Signature,
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                other => AuthError::Malformed(other.to_string()),
            })?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::{Deserialize, Serialize};

    // A minimal P-256 keypair generated purely for this test module.
    const PRIVATE_KEY_PEM: &str = include_str!("../testdata/ec_private_key.pem");
    const PUBLIC_KEY_PEM: &str = include_str!("../testdata/ec_public_key.pem");

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestClaims {
        sub: String,
        exp: usize,
    }

    #[test]
    fn decodes_a_validly_signed_token() {
        let encoding_key = EncodingKey::from_ec_pem(PRIVATE_KEY_PEM.as_bytes()).unwrap();
        let claims = TestClaims {
            sub: "file-1".into(),
            exp: 9_999_999_999,
        };
        let token = encode(&Header::new(Algorithm::ES256), &claims, &encoding_key).unwrap();

        let auth = JwtAuth::from_ec_pem(PUBLIC_KEY_PEM.as_bytes()).unwrap();
        let decoded: TestClaims = auth.decode(&token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn rejects_an_expired_token() {
        let encoding_key = EncodingKey::from_ec_pem(PRIVATE_KEY_PEM.as_bytes()).unwrap();
        let claims = TestClaims {
            sub: "file-1".into(),
            exp: 1,
        };
        let token = encode(&Header::new(Algorithm::ES256), &claims, &encoding_key).unwrap();

        let auth = JwtAuth::from_ec_pem(PUBLIC_KEY_PEM.as_bytes()).unwrap();
        let result: Result<TestClaims, _> = auth.decode(&token);
        assert!(matches!(result, Err(AuthError::Expired)));
    }
}
