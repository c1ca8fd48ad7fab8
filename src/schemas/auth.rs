use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: &'static str,
}

impl TokenResponse {
    pub(crate) fn bearer(access_token: String) -> Self {
        Self { access_token, token_type: "bearer" }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LoginRequest {
    #[validate(length(min = 3, max = 64))]
    pub(crate) username: String,
    #[validate(length(min = 1, max = 128))]
    pub(crate) password: String,
}

/// OAuth2 password-grant form body, for clients that speak the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenForm {
    pub(crate) username: String,
    pub(crate) password: String,
}
