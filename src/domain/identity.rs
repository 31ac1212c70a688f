use serde::Deserialize;

use super::errors::DomainError;

/// Privilege level of the caller, resolved once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    /// The only place a role claim string is interpreted.
    pub fn from_claim(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("admin") || raw.eq_ignore_ascii_case("super admin") {
            Role::Admin
        } else {
            Role::Customer
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
    /// Bearer token forwarded to downstream services.
    pub token: String,
}

pub trait IdentityDecoder: Send + Sync + 'static {
    fn decode(&self, credential: &str) -> Result<Principal, DomainError>;
}

#[derive(Debug, Deserialize)]
struct GatewayClaims {
    user_id: i64,
    #[serde(default)]
    role_name: String,
    token: String,
}

/// Reads the JSON claims blob the authentication gateway forwards after it has
/// verified the access token.
#[derive(Debug, Default, Clone, Copy)]
pub struct GatewayClaimsDecoder;

impl IdentityDecoder for GatewayClaimsDecoder {
    fn decode(&self, credential: &str) -> Result<Principal, DomainError> {
        if credential.trim().is_empty() {
            return Err(DomainError::Unauthorized("data token not found".to_string()));
        }
        let claims: GatewayClaims = serde_json::from_str(credential)
            .map_err(|e| DomainError::Unauthorized(format!("malformed claims: {}", e)))?;
        if claims.token.is_empty() {
            return Err(DomainError::Unauthorized("missing bearer token".to_string()));
        }
        Ok(Principal {
            user_id: claims.user_id,
            role: Role::from_claim(&claims.role_name),
            token: claims.token,
        })
    }
}
