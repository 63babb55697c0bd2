use crate::error::{CoreError, CoreResult};
use crate::metrics::LOGIN_ATTEMPTS_TOTAL;
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User, UserRole, UserView};
use crate::utils::time::Clock;
use anyhow::Context;
use bcrypt::{hash, verify, DEFAULT_COST};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use redis::aio::ConnectionManager;
use std::sync::Arc;

use super::account_service::AccountService;

const MAX_FAILED_LOGINS: u32 = 5;
const LOCKOUT_WINDOW_SECONDS: u64 = 900;

/// Registration, login with Redis-backed failed-attempt lockout, and
/// access token issuance.
pub struct AuthService {
    mongo: Database,
    redis: ConnectionManager,
    jwt_service: JwtService,
    clock: Arc<dyn Clock>,
    access_token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(
        mongo: Database,
        redis: ConnectionManager,
        jwt_service: JwtService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let access_token_ttl_seconds = std::env::var("JWT_ACCESS_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(3600);

        Self {
            mongo,
            redis,
            jwt_service,
            clock,
            access_token_ttl_seconds,
        }
    }

    pub fn hash_password(&self, password: &str) -> CoreResult<String> {
        Ok(hash(password, DEFAULT_COST).context("Failed to hash password")?)
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> CoreResult<bool> {
        Ok(verify(password, password_hash).context("Failed to verify password")?)
    }

    /// Registers a new account. Non-child roles can only be assigned by
    /// an admin caller.
    pub async fn register(&self, req: RegisterRequest, is_admin: bool) -> CoreResult<AuthResponse> {
        let role = req.role.unwrap_or_default();
        if role != UserRole::Child && !is_admin {
            return Err(CoreError::validation(
                "Only admins can create parent or admin accounts",
            ));
        }

        let users = self.mongo.collection::<User>("users");
        let existing = users
            .find_one(doc! { "email": &req.email })
            .await
            .context("Failed to check existing user")?;
        if existing.is_some() {
            return Err(CoreError::validation("User with this email already exists"));
        }

        let password_hash = self.hash_password(&req.password)?;
        let now = self.clock.now();
        let user = User {
            id: None,
            email: req.email.clone(),
            username: req.username,
            password_hash,
            first_name: req.first_name.unwrap_or_default(),
            last_name: req.last_name.unwrap_or_default(),
            role,
            birth_date: req.birth_date,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        // Unique index on email backstops the pre-check under races.
        let insert_result = users
            .insert_one(&user)
            .await
            .map_err(|err| CoreError::from_mongo(err, "user"))?;
        let user_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| CoreError::Storage(anyhow::anyhow!("Failed to get inserted user ID")))?;

        let accounts = AccountService::new(self.mongo.clone(), self.clock.clone());
        accounts.ensure_profile(&user_id.to_hex()).await?;
        accounts.ensure_settings(&user_id.to_hex()).await?;

        let access_token = self.generate_access_token(&user_id, role)?;

        tracing::info!(user_id = %user_id.to_hex(), email = %req.email, "User registered");

        let mut user_with_id = user;
        user_with_id.id = Some(user_id);
        Ok(AuthResponse {
            access_token,
            user: UserView::from(user_with_id),
        })
    }

    pub async fn login(&self, req: LoginRequest, ip: Option<&str>) -> CoreResult<AuthResponse> {
        if self.is_locked_out(&req.email).await? {
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["locked"]).inc();
            tracing::warn!(email = %req.email, ip = ?ip, "Login rejected: account locked out");
            return Err(CoreError::validation(
                "Too many failed login attempts, try again later",
            ));
        }

        let users = self.mongo.collection::<User>("users");
        let user = users
            .find_one(doc! { "email": &req.email, "is_active": true })
            .await
            .context("Failed to query user")?;

        let Some(user) = user else {
            self.record_failed_login(&req.email).await?;
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();
            return Err(CoreError::validation("Invalid email or password"));
        };

        if !self.verify_password(&req.password, &user.password_hash)? {
            self.record_failed_login(&req.email).await?;
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();
            tracing::warn!(email = %req.email, ip = ?ip, "Failed login attempt: invalid password");
            return Err(CoreError::validation("Invalid email or password"));
        }

        let user_id = user
            .id
            .ok_or_else(|| CoreError::Storage(anyhow::anyhow!("User ID not found")))?;

        self.clear_failed_logins(&req.email).await?;

        users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "lastLoginAt": mongodb::bson::DateTime::now() } },
            )
            .await
            .context("Failed to update last login timestamp")?;

        let access_token = self.generate_access_token(&user_id, user.role)?;

        LOGIN_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
        tracing::info!(user_id = %user_id.to_hex(), email = %req.email, ip = ?ip, "User logged in");

        Ok(AuthResponse {
            access_token,
            user: UserView::from(user),
        })
    }

    pub async fn me(&self, user_id: &str) -> CoreResult<UserView> {
        let accounts = AccountService::new(self.mongo.clone(), self.clock.clone());
        Ok(UserView::from(accounts.get_user(user_id).await?))
    }

    fn generate_access_token(&self, user_id: &ObjectId, role: UserRole) -> CoreResult<String> {
        let now = self.clock.now().timestamp();
        let claims = JwtClaims {
            sub: user_id.to_hex(),
            role,
            exp: (now + self.access_token_ttl_seconds) as usize,
            iat: now as usize,
        };
        self.jwt_service
            .generate_token(claims)
            .map_err(|e| CoreError::Storage(anyhow::anyhow!(e)))
    }

    fn lockout_key(email: &str) -> String {
        format!("login:lockout:{}", email.to_lowercase())
    }

    async fn is_locked_out(&self, email: &str) -> CoreResult<bool> {
        let mut conn = self.redis.clone();
        let failures: Option<u32> = redis::cmd("GET")
            .arg(Self::lockout_key(email))
            .query_async(&mut conn)
            .await
            .context("Failed to read lockout counter")?;
        Ok(failures.unwrap_or(0) >= MAX_FAILED_LOGINS)
    }

    async fn record_failed_login(&self, email: &str) -> CoreResult<()> {
        let mut conn = self.redis.clone();
        let key = Self::lockout_key(email);
        let failures: u32 = redis::cmd("INCR")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .context("Failed to increment lockout counter")?;
        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(LOCKOUT_WINDOW_SECONDS)
            .query_async::<()>(&mut conn)
            .await
            .context("Failed to set lockout expiry")?;
        if failures >= MAX_FAILED_LOGINS {
            tracing::warn!(email = %email, failures, "Login lockout engaged");
        }
        Ok(())
    }

    async fn clear_failed_logins(&self, email: &str) -> CoreResult<()> {
        let mut conn = self.redis.clone();
        redis::cmd("DEL")
            .arg(Self::lockout_key(email))
            .query_async::<()>(&mut conn)
            .await
            .context("Failed to clear lockout counter")?;
        Ok(())
    }
}
