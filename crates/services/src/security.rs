//! Registration, authentication, e-mail verification and self-anonymisation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use domains::models::{BanState, Principal, Profile, Role, User, UserId, VerificationKey};
use domains::ports::{Mailer, PasswordHasher, ProfileRepository, TokenIssuer, UserRepository};
use domains::{AppError, Result, TokenError};

use crate::authorization::is_banned;
use crate::validation::{check_fields, FieldSpec, Rule};

const REGISTER: &[FieldSpec] = &[
    FieldSpec::text("name").required(),
    FieldSpec::text("email").required().rule(Rule::Email),
    FieldSpec::text("password")
        .required()
        .verbatim()
        .rule(Rule::MinLength(8)),
];

const AUTHENTICATE: &[FieldSpec] = &[
    FieldSpec::text("email").required(),
    FieldSpec::text("password").required().verbatim(),
];

const RESEND: &[FieldSpec] = &[FieldSpec::text("email").required().rule(Rule::Email)];

/// Public representation of a freshly registered account.
#[derive(Debug, Clone, Serialize)]
pub struct Registered {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SecurityOptions {
    pub verification_ttl: Duration,
}

impl Default for SecurityOptions {
    fn default() -> Self {
        Self {
            verification_ttl: Duration::minutes(5),
        }
    }
}

#[derive(Clone)]
pub struct SecurityService {
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
    mailer: Arc<dyn Mailer>,
    options: SecurityOptions,
}

impl SecurityService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ProfileRepository>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
        mailer: Arc<dyn Mailer>,
        options: SecurityOptions,
    ) -> Self {
        Self {
            users,
            profiles,
            hasher,
            tokens,
            mailer,
            options,
        }
    }

    fn fresh_key(&self) -> VerificationKey {
        VerificationKey {
            key: Uuid::new_v4().simple().to_string(),
            expires_at: Utc::now() + self.options.verification_ttl,
        }
    }

    /// Best-effort delivery. Failures are logged and never reach the caller.
    fn dispatch_verification(&self, to: String, key: String) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(err) = mailer.send_verification(&to, &key).await {
                warn!(error = %err, "verification mail not delivered");
            }
        });
    }

    /// Argon2 is CPU-bound; it runs on the blocking pool, not on the async workers.
    async fn hash_password(&self, password: String) -> Result<String> {
        let hasher = self.hasher.clone();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(anyhow::Error::from)??;
        Ok(hash)
    }

    async fn password_matches(&self, password: String, hash: String) -> Result<bool> {
        let hasher = self.hasher.clone();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(anyhow::Error::from)?;
        Ok(matches)
    }

    pub async fn register(&self, payload: &Value) -> Result<Registered> {
        let mut clean = check_fields(REGISTER, payload).map_err(AppError::Validation)?;
        let name = clean.take_text("name").unwrap_or_default();
        let email = clean.take_text("email").unwrap_or_default().to_lowercase();
        let password = clean.take_text("password").unwrap_or_default();

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Rejected("user already exists".to_string()));
        }

        let password_hash = self.hash_password(password).await?;
        let now = Utc::now();
        let verification = self.fresh_key();
        let user = User {
            id: UserId::new(),
            name,
            email,
            password_hash,
            roles: BTreeSet::from([Role::User]),
            ban: BanState::default(),
            email_verified: false,
            verification: Some(verification.clone()),
            anonymized: false,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(user.clone()).await?;
        if let Err(err) = self.profiles.insert(Profile::empty(user.id)).await {
            // An account without a profile is unusable; take the user back out.
            if let Err(undo) = self.users.delete(user.id).await {
                error!(
                    user_id = %user.id,
                    error = %undo,
                    "registration left an account without profile"
                );
            }
            return Err(err.into());
        }
        info!(user_id = %user.id, "user registered");

        self.dispatch_verification(user.email.clone(), verification.key);
        Ok(Registered {
            id: user.id,
            name: user.name,
            email: user.email,
        })
    }

    /// Returns a bearer token for valid, verified, unbanned credentials.
    pub async fn authenticate(&self, payload: &Value) -> Result<String> {
        let invalid = || AppError::Rejected("invalid credentials".to_string());

        let mut clean = check_fields(AUTHENTICATE, payload).map_err(AppError::Validation)?;
        let email = clean.take_text("email").unwrap_or_default().to_lowercase();
        let password = clean.take_text("password").unwrap_or_default();

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .filter(|u| !u.anonymized)
            .ok_or_else(invalid)?;
        if !self
            .password_matches(password, user.password_hash.clone())
            .await?
        {
            return Err(invalid());
        }
        if is_banned(&user.ban, Utc::now()) {
            return Err(AppError::Banned);
        }
        if !user.email_verified {
            return Err(AppError::Rejected("email not confirmed".to_string()));
        }

        let token = self.tokens.issue(&Principal::from(&user))?;
        info!(user_id = %user.id, "user authenticated");
        Ok(token)
    }

    /// Resolves a bearer token to the live principal. The stored record is
    /// authoritative for roles and bans.
    pub async fn principal_from_token(&self, token: &str) -> Result<Principal> {
        let claims = self.tokens.verify(token).map_err(|err| match err {
            TokenError::Expired => AppError::Unauthenticated("token expired"),
            TokenError::Invalid => AppError::Unauthenticated("invalid token"),
        })?;

        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .filter(|u| !u.anonymized)
            .ok_or(AppError::Unauthenticated("unknown principal"))?;
        if is_banned(&user.ban, Utc::now()) {
            return Err(AppError::Banned);
        }
        Ok(Principal::from(&user))
    }

    /// Anonymises the caller's account in place and drops the profile.
    pub async fn delete_me(&self, principal: &Principal) -> Result<()> {
        let mut user = self
            .users
            .find_by_id(principal.id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        if user.roles.contains(&Role::Admin) {
            return Err(AppError::Rejected("this account can't be deleted".to_string()));
        }

        let scrambled = self.hash_password(Uuid::new_v4().to_string()).await?;
        user.anonymize(scrambled, Utc::now());
        self.users.replace(user).await?;
        self.profiles.delete_by_user(principal.id).await?;
        info!(user_id = %principal.id, "account anonymised");
        Ok(())
    }

    /// Confirms an e-mail address. An expired key is replaced and re-sent.
    pub async fn verify(&self, key: &str) -> Result<()> {
        let mut user = self
            .users
            .find_by_verification_key(key)
            .await?
            .ok_or(AppError::NotFound("user"))?;

        let now = Utc::now();
        let expired = user
            .verification
            .as_ref()
            .is_some_and(|pending| pending.is_expired(now));
        if expired {
            let fresh = self.fresh_key();
            user.verification = Some(fresh.clone());
            user.updated_at = now;
            self.users.replace(user.clone()).await?;
            self.dispatch_verification(user.email, fresh.key);
            return Err(AppError::Rejected("key expired, new email sent".to_string()));
        }

        user.email_verified = true;
        user.verification = None;
        user.updated_at = now;
        let id = user.id;
        self.users.replace(user).await?;
        info!(user_id = %id, "email verified");
        Ok(())
    }

    pub async fn resend(&self, payload: &Value) -> Result<()> {
        let mut clean = check_fields(RESEND, payload).map_err(AppError::Validation)?;
        let email = clean.take_text("email").unwrap_or_default().to_lowercase();

        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .filter(|u| !u.anonymized)
            .ok_or(AppError::NotFound("user"))?;

        let fresh = self.fresh_key();
        user.verification = Some(fresh.clone());
        user.updated_at = Utc::now();
        self.users.replace(user.clone()).await?;
        self.dispatch_verification(user.email, fresh.key);
        Ok(())
    }
}
