//! User service
//!
//! Staff authentication for the admin API: password login, opaque session
//! tokens, and the first-start bootstrap of an admin account.

use crate::config::AdminBootstrap;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Correct credentials for an account without staff rights
    #[error("Staff access required")]
    Forbidden,

    #[error("User not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    session_ttl: Duration,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl: Duration::hours(session_ttl_hours),
        }
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(User, Session), UserServiceError> {
        let user = self
            .users
            .get_by_username(username.trim())
            .await?
            .ok_or(UserServiceError::InvalidCredentials)?;

        let valid = verify_password(password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::InvalidCredentials);
        }
        if !user.is_staff {
            return Err(UserServiceError::Forbidden);
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + self.session_ttl,
            created_at: now,
        };
        self.sessions.create(&session).await?;

        tracing::info!(user_id = user.id, "Admin login");
        Ok((user, session))
    }

    /// The user behind a live session. Expired sessions are deleted on sight.
    pub async fn validate_session(&self, id: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self.sessions.get_by_id(id).await? else {
            return Ok(None);
        };
        if session.is_expired() {
            self.sessions.delete(id).await?;
            return Ok(None);
        }
        Ok(self.users.get_by_id(session.user_id).await?)
    }

    pub async fn logout(&self, id: &str) -> Result<(), UserServiceError> {
        self.sessions.delete(id).await?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<User, UserServiceError> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or(UserServiceError::NotFound(id))
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self.sessions.delete_expired().await?)
    }

    /// Create the configured staff account when no user exists yet.
    /// Returns the account when one was created.
    pub async fn ensure_admin(
        &self,
        bootstrap: Option<&AdminBootstrap>,
    ) -> Result<Option<User>, UserServiceError> {
        if self.users.count().await? > 0 {
            return Ok(None);
        }
        let Some(admin) = bootstrap else {
            tracing::warn!("No users exist and no admin account is configured; the admin API is unusable");
            return Ok(None);
        };

        let user = self
            .users
            .create(&CreateUserInput {
                username: admin.username.trim().to_string(),
                email: admin.email.trim().to_string(),
                password_hash: hash_password(&admin.password)?,
                is_staff: true,
            })
            .await?;

        tracing::info!(username = %user.username, "Created admin account");
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            24,
        );
        (pool, service)
    }

    fn bootstrap() -> AdminBootstrap {
        AdminBootstrap {
            username: "chief".to_string(),
            email: "chief@example.com".to_string(),
            password: "s3cret-pass".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ensure_admin_only_on_empty_table() {
        let (_pool, service) = setup().await;
        assert!(service.ensure_admin(None).await.unwrap().is_none());

        let created = service.ensure_admin(Some(&bootstrap())).await.unwrap();
        assert!(created.unwrap().is_staff);

        let again = service.ensure_admin(Some(&bootstrap())).await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_login_and_session_lifecycle() {
        let (_pool, service) = setup().await;
        service.ensure_admin(Some(&bootstrap())).await.unwrap();

        let (user, session) = service.login("chief", "s3cret-pass").await.unwrap();
        assert_eq!(user.username, "chief");
        assert!(session.expires_at > Utc::now() + Duration::hours(23));

        let current = service.validate_session(&session.id).await.unwrap();
        assert_eq!(current.unwrap().id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rejections() {
        let (pool, service) = setup().await;
        service.ensure_admin(Some(&bootstrap())).await.unwrap();

        assert!(matches!(
            service.login("chief", "wrong").await,
            Err(UserServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("nobody", "s3cret-pass").await,
            Err(UserServiceError::InvalidCredentials)
        ));

        SqlxUserRepository::new(pool)
            .create(&CreateUserInput {
                username: "reporter".to_string(),
                email: String::new(),
                password_hash: hash_password("pass").unwrap(),
                is_staff: false,
            })
            .await
            .unwrap();
        assert!(matches!(
            service.login("reporter", "pass").await,
            Err(UserServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (pool, service) = setup().await;
        let admin = service
            .ensure_admin(Some(&bootstrap()))
            .await
            .unwrap()
            .unwrap();

        let sessions = SqlxSessionRepository::new(pool);
        let stale = Session {
            id: "stale-token".to_string(),
            user_id: admin.id,
            expires_at: Utc::now() - Duration::minutes(1),
            created_at: Utc::now() - Duration::hours(2),
        };
        sessions.create(&stale).await.unwrap();

        assert!(service.validate_session("stale-token").await.unwrap().is_none());
        assert!(sessions.get_by_id("stale-token").await.unwrap().is_none());
    }
}
