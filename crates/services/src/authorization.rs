//! Role, ownership and ban checks shared by every mutation pipeline.

use chrono::{DateTime, Utc};

use domains::models::{BanState, Principal, Role, UserId};
use domains::Denial;

/// `true` iff the principal holds ADMIN or exactly `required`.
pub fn is_granted(principal: &Principal, required: Role) -> bool {
    principal.has_tag(Role::Admin) || principal.has_tag(required)
}

pub fn require_role(principal: &Principal, required: Role) -> Result<(), Denial> {
    if is_granted(principal, required) {
        Ok(())
    } else {
        Err(Denial::MissingRole(required))
    }
}

/// What a principal must satisfy to mutate an existing resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub owner: UserId,
    /// Role the actor must still hold at mutation time, e.g. AUTHOR for articles.
    pub role: Option<Role>,
}

impl Ownership {
    pub fn of(owner: UserId) -> Self {
        Self { owner, role: None }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

/// Owner-or-ADMIN, and the role requirement if one is set.
///
/// A former author who lost the role gets `RoleRevoked`, anyone else who is
/// neither owner nor ADMIN gets `NotOwner`.
pub fn can_mutate(principal: &Principal, rule: Ownership) -> Result<(), Denial> {
    let is_admin = principal.has_tag(Role::Admin);
    if principal.id != rule.owner && !is_admin {
        return Err(Denial::NotOwner);
    }
    match rule.role {
        Some(role) if !is_granted(principal, role) => Err(Denial::RoleRevoked(role)),
        _ => Ok(()),
    }
}

/// Active iff an expiry exists and lies strictly in the future.
pub fn is_banned(ban: &BanState, now: DateTime<Utc>) -> bool {
    ban.banned_until.is_some_and(|until| until > now)
}
