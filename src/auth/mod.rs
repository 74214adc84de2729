mod scheme;
mod token;

pub use scheme::Jwt;
pub use token::{AccessClaims, RefreshClaims, TOKEN_TYPE, TokenPair, TokenService};
