use std::collections::HashMap;

use async_trait::async_trait;
use log::error;
use reqwest::Client;

use super::http::{get_envelope, ids_param};
use crate::domain::enrichment::CustomerProfile;
use crate::domain::errors::DomainError;
use crate::domain::identity::{Principal, Role};
use crate::domain::ports::UserDirectory;

/// HTTP client for the user service.
///
/// Admins read any customer through `/admin/customers`; customers can only
/// read their own profile (`/auth/profile`) and go through `/auth/customers`
/// for bulk lookups.
pub struct HttpUserDirectory {
    client: Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn profile_url(&self, buyer_id: i64, role: Role) -> String {
        match role {
            Role::Admin => format!("{}/admin/customers/{}", self.base_url, buyer_id),
            Role::Customer => format!("{}/auth/profile", self.base_url),
        }
    }

    fn bulk_url(&self, ids: &[i64], role: Role) -> String {
        let scope = match role {
            Role::Admin => "admin",
            Role::Customer => "auth",
        };
        format!(
            "{}/{}/customers/bulk?ids={}",
            self.base_url,
            scope,
            ids_param(ids)
        )
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn get_profile(
        &self,
        buyer_id: i64,
        caller: &Principal,
    ) -> Result<CustomerProfile, DomainError> {
        let url = self.profile_url(buyer_id, caller.role);
        get_envelope(&self.client, &url, &caller.token)
            .await
            .map_err(|e| {
                error!("[UserDirectory] profile {} lookup failed: {}", buyer_id, e);
                e
            })
    }

    async fn get_profiles(
        &self,
        buyer_ids: &[i64],
        caller: &Principal,
    ) -> Result<HashMap<i64, CustomerProfile>, DomainError> {
        if buyer_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let url = self.bulk_url(buyer_ids, caller.role);
        let profiles: Vec<CustomerProfile> = get_envelope(&self.client, &url, &caller.token)
            .await
            .map_err(|e| {
                error!("[UserDirectory] bulk lookup of {} buyers failed: {}", buyer_ids.len(), e);
                e
            })?;
        Ok(profiles.into_iter().map(|p| (p.id, p)).collect())
    }
}
