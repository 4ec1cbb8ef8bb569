use anyhow::{anyhow, Result};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{CallerIdentity, Role, User};

use crate::postgrest::PostgrestClient;

/// Maps an authenticated user to their role and linked profile row.
pub struct IdentityResolver {
    client: PostgrestClient,
}

impl IdentityResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: PostgrestClient::new(config),
        }
    }

    pub async fn resolve(&self, user: &User, auth_token: &str) -> Result<CallerIdentity> {
        let user_id = Uuid::parse_str(&user.id)
            .map_err(|_| anyhow!("Token subject is not a valid user id"))?;

        let role: Role = user
            .role
            .as_deref()
            .unwrap_or("patient")
            .parse()
            .map_err(|e: String| anyhow!(e))?;

        let profile_id = match role {
            Role::Patient => self.profile_id("patients", user_id, auth_token).await?,
            Role::Doctor => self.profile_id("doctors", user_id, auth_token).await?,
            Role::Admin => None,
        };

        debug!("Resolved caller {} as {} (profile {:?})", user_id, role, profile_id);

        Ok(CallerIdentity { user_id, role, profile_id })
    }

    async fn profile_id(
        &self,
        table: &str,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Uuid>> {
        let path = format!("/rest/v1/{}?user_id=eq.{}&select=id", table, user_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        match rows.first().and_then(|row| row["id"].as_str()) {
            Some(id) => Ok(Some(Uuid::parse_str(id)?)),
            None => Ok(None),
        }
    }
}
