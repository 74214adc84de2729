use axum::http::HeaderValue;
use axum_extra::headers::authorization::Credentials;

/// `Authorization: JWT <token>` 凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jwt(String);

impl Jwt {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl Credentials for Jwt {
    const SCHEME: &'static str = "JWT";

    fn decode(value: &HeaderValue) -> Option<Self> {
        let value = value.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case(Self::SCHEME) {
            return None;
        }

        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    fn encode(&self) -> HeaderValue {
        HeaderValue::from_str(&format!("{} {}", Self::SCHEME, self.0))
            .unwrap_or_else(|_| HeaderValue::from_static("JWT"))
    }
}
