//! Administrator capability lookup used to gate settlement reversal

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;

/// Answers "is this user an administrator"
#[async_trait]
pub trait AdminCheck: Send + Sync {
    async fn is_admin(&self, user_id: Uuid) -> AppResult<bool>;
}

/// Reads `profiles.role`
#[derive(Clone)]
pub struct PgAdminCheck {
    db: PgPool,
}

impl PgAdminCheck {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AdminCheck for PgAdminCheck {
    async fn is_admin(&self, user_id: Uuid) -> AppResult<bool> {
        let is_admin = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM profiles WHERE id = $1 AND role = 'admin')",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(is_admin)
    }
}

/// Fixed set of administrators, for tests and database-less runs
#[derive(Debug, Clone, Default)]
pub struct StaticAdminCheck {
    admins: HashSet<Uuid>,
}

impl StaticAdminCheck {
    pub fn new(admins: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }
}

#[async_trait]
impl AdminCheck for StaticAdminCheck {
    async fn is_admin(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self.admins.contains(&user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_admin_check() {
        let admin = Uuid::new_v4();
        let check = StaticAdminCheck::new([admin]);

        assert!(check.is_admin(admin).await.unwrap());
        assert!(!check.is_admin(Uuid::new_v4()).await.unwrap());
    }
}
