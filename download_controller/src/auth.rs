//! Work-order token validation (§4.6): generic JWS verification lives in
//! `utils::auth::JwtAuth`; this module adds the domain-specific checks
//! that only this service's tokens need (`type == "download"`, `file_id`
//! matches the requested path parameter).

use utils::auth::{AuthError, JwtAuth};

use crate::errors::RepositoryError;
use crate::models::WorkOrderToken;

pub fn decode_and_check(
    jwt_auth: &JwtAuth,
    token: &str,
    expected_file_id: &str,
) -> Result<WorkOrderToken, RepositoryError> {
    let claims: WorkOrderToken = jwt_auth.decode(token).map_err(|e| match e {
        AuthError::Expired => RepositoryError::TokenExpired,
        AuthError::Signature => RepositoryError::TokenSignature,
        AuthError::Malformed(_) => RepositoryError::TokenMalformed,
    })?;

    if claims.token_type != "download" {
        return Err(RepositoryError::TokenMalformed);
    }
    if claims.file_id != expected_file_id {
        return Err(RepositoryError::TokenMalformed);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    const PRIVATE_KEY_PEM: &str = include_str!("../../libs/utils/testdata/ec_private_key.pem");
    const PUBLIC_KEY_PEM: &str = include_str!("../../libs/utils/testdata/ec_public_key.pem");

    fn sign(claims: &WorkOrderToken) -> String {
        let encoding_key = EncodingKey::from_ec_pem(PRIVATE_KEY_PEM.as_bytes()).unwrap();
        encode(&Header::new(Algorithm::ES256), claims, &encoding_key).unwrap()
    }

    fn base_claims(file_id: &str) -> WorkOrderToken {
        WorkOrderToken {
            token_type: "download".to_string(),
            file_id: file_id.to_string(),
            user_id: "user-1".to_string(),
            full_user_name: "Jane Doe".to_string(),
            email: "jane@example.org".to_string(),
            user_public_crypt4gh_key: "base64key".to_string(),
            exp: 9_999_999_999,
        }
    }

    #[test]
    fn accepts_a_matching_download_token() {
        let auth = JwtAuth::from_ec_pem(PUBLIC_KEY_PEM.as_bytes()).unwrap();
        let token = sign(&base_claims("file-1"));
        let claims = decode_and_check(&auth, &token, "file-1").unwrap();
        assert_eq!(claims.file_id, "file-1");
    }

    #[test]
    fn rejects_a_token_for_a_different_file_id() {
        let auth = JwtAuth::from_ec_pem(PUBLIC_KEY_PEM.as_bytes()).unwrap();
        let token = sign(&base_claims("file-1"));
        let err = decode_and_check(&auth, &token, "file-2").unwrap_err();
        assert!(matches!(err, RepositoryError::TokenMalformed));
    }

    #[test]
    fn rejects_a_non_download_token() {
        let auth = JwtAuth::from_ec_pem(PUBLIC_KEY_PEM.as_bytes()).unwrap();
        let mut claims = base_claims("file-1");
        claims.token_type = "upload".to_string();
        let token = sign(&claims);
        let err = decode_and_check(&auth, &token, "file-1").unwrap_err();
        assert!(matches!(err, RepositoryError::TokenMalformed));
    }

    #[test]
    fn rejects_an_expired_token() {
        let auth = JwtAuth::from_ec_pem(PUBLIC_KEY_PEM.as_bytes()).unwrap();
        let mut claims = base_claims("file-1");
        claims.exp = 1;
        let token = sign(&claims);
        let err = decode_and_check(&auth, &token, "file-1").unwrap_err();
        assert!(matches!(err, RepositoryError::TokenExpired));
    }
}
