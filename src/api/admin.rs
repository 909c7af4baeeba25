use std::sync::Arc;

use super::types::{AdminUserUpdate, Tier, UserPage, UserProfile};
use crate::error::Result;
use crate::gateway::{ApiRequest, Gateway};

/// Filters for the admin user listing.
#[derive(Debug, Clone, Default)]
pub struct ListUsersQuery {
    pub tier: Option<Tier>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Administrative endpoints; the server enforces the admin flag.
#[derive(Debug, Clone)]
pub struct AdminApi {
    gateway: Arc<Gateway>,
}

impl AdminApi {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn list_users(&self, query: &ListUsersQuery) -> Result<UserPage> {
        let mut request = ApiRequest::get("/admin/users");
        if let Some(tier) = query.tier {
            request = request.query("tier", tier);
        }
        if let Some(page) = query.page {
            request = request.query("page", page);
        }
        if let Some(limit) = query.limit {
            request = request.query("limit", limit);
        }
        self.gateway.json(request).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
        self.gateway
            .json(ApiRequest::get(format!("/admin/users/{user_id}")))
            .await
    }

    pub async fn update_user(
        &self,
        user_id: &str,
        update: &AdminUserUpdate,
    ) -> Result<UserProfile> {
        let request = ApiRequest::patch(format!("/admin/users/{user_id}")).json(update)?;
        self.gateway.json(request).await
    }
}
