//! Administrative actions.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use domains::models::{BanState, Principal, Role, UserId};
use domains::ports::UserRepository;
use domains::{AppError, Result, ValidationError};

use crate::authorization::require_role;
use crate::ensure_active;

#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UserRepository>,
}

impl AdminService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Bans `user_id` for `minutes`; the third ban is permanent.
    pub async fn ban(&self, principal: &Principal, user_id: &str, minutes: &str) -> Result<BanState> {
        ensure_active(principal)?;
        require_role(principal, Role::Admin)?;

        let mut errors = Vec::new();
        let target = user_id.parse::<UserId>().map_err(|_| {
            errors.push(ValidationError::InvalidFormat {
                field: "id".to_string(),
            })
        });
        let minutes = minutes.parse::<u32>().map_err(|_| {
            errors.push(ValidationError::InvalidFormat {
                field: "minutes".to_string(),
            })
        });
        let (Ok(target), Ok(minutes)) = (target, minutes) else {
            return Err(AppError::Validation(errors));
        };

        let ban = self
            .users
            .record_ban(target, minutes, Utc::now())
            .await?
            .ok_or(AppError::NotFound("user"))?;

        warn!(
            user_id = %target,
            admin_id = %principal.id,
            ban_count = ban.ban_count,
            "user banned"
        );
        Ok(ban)
    }
}
