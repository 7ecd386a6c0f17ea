//! Shared-secret API key authentication.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Validates requests against a single configured key.
///
/// The key is looked up, in order, in:
/// - `X-API-Key: <key>`
/// - `Authorization: Bearer <key>`
/// - the `api_key` query parameter (for clients that cannot set headers)
pub struct ApiKeyAuthenticator {
    expected_key: String,
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: String) -> Self {
        Self {
            expected_key: api_key,
        }
    }

    fn extract_key<'a>(request: &'a AuthRequest) -> Option<&'a str> {
        if let Some(key) = request.headers.get("x-api-key") {
            return Some(key.as_str());
        }

        if let Some(value) = request.headers.get("authorization") {
            let token = value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "));
            if token.is_some() {
                return token;
            }
        }

        request.query.get("api_key").map(String::as_str)
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided = Self::extract_key(request).ok_or(AuthError::NotAuthenticated)?;

        if constant_time_eq(provided.as_bytes(), self.expected_key.as_bytes()) {
            Ok(Identity {
                client_id: "api_key_client".to_string(),
                method: "api_key".to_string(),
            })
        } else {
            Err(AuthError::InvalidCredentials("Invalid API key".to_string()))
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

/// Byte comparison whose duration does not depend on where the inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_request(headers: &[(&str, &str)], query: &[(&str, &str)]) -> AuthRequest {
        AuthRequest {
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            source_ip: "127.0.0.1".parse().unwrap(),
        }
    }

    fn auth() -> ApiKeyAuthenticator {
        ApiKeyAuthenticator::new("secret-key-123".to_string())
    }

    #[tokio::test]
    async fn test_x_api_key_header_valid() {
        let request = make_request(&[("X-API-Key", "secret-key-123")], &[]);
        let identity = auth().authenticate(&request).await.unwrap();
        assert_eq!(identity.method, "api_key");
    }

    #[tokio::test]
    async fn test_bearer_token_valid() {
        for header in ["Bearer secret-key-123", "bearer secret-key-123"] {
            let request = make_request(&[("Authorization", header)], &[]);
            assert!(auth().authenticate(&request).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_query_parameter_valid() {
        let request = make_request(&[], &[("api_key", "secret-key-123")]);
        assert!(auth().authenticate(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_header_wins_over_query() {
        let request = make_request(
            &[("X-API-Key", "wrong")],
            &[("api_key", "secret-key-123")],
        );
        let result = auth().authenticate(&request).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let request = make_request(&[("Authorization", "Bearer wrong-key")], &[]);
        let result = auth().authenticate(&request).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let request = AuthRequest {
            headers: HashMap::new(),
            query: HashMap::new(),
            source_ip: "127.0.0.1".parse().unwrap(),
        };
        let result = auth().authenticate(&request).await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
        assert!(constant_time_eq(b"", b""));
    }
}
