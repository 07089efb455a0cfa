//! Profile reads and edits.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use domains::models::{Principal, Profile, Role, UserId};
use domains::ports::{ProfileRepository, UserRepository};
use domains::{AppError, Result, ValidationError};

use crate::authorization::require_role;
use crate::ensure_active;
use crate::validation::{check_fields, CleanValue, FieldSpec};

const EDIT: &[FieldSpec] = &[
    FieldSpec::text("bio").allow_empty(),
    FieldSpec::text("avatar").allow_empty(),
    FieldSpec::text("twitch").allow_empty(),
    FieldSpec::text("twitter").allow_empty(),
    FieldSpec::text("instagram").allow_empty(),
    FieldSpec::text("tiktok").allow_empty(),
    FieldSpec::text("youtube").allow_empty(),
];

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub name: String,
    /// Only present when the caller reads their own profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct ProfileService {
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    pub fn new(users: Arc<dyn UserRepository>, profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { users, profiles }
    }

    async fn view(&self, user: UserId, with_email: bool) -> Result<ProfileView> {
        let owner = self
            .users
            .find_by_id(user)
            .await?
            .filter(|u| !u.anonymized)
            .ok_or(AppError::NotFound("profile"))?;
        let profile = self
            .profiles
            .find_by_user(user)
            .await?
            .ok_or(AppError::NotFound("profile"))?;
        Ok(ProfileView {
            profile,
            name: owner.name,
            email: with_email.then_some(owner.email),
        })
    }

    pub async fn me(&self, principal: &Principal) -> Result<ProfileView> {
        self.view(principal.id, true).await
    }

    pub async fn of_user(&self, id: &str) -> Result<ProfileView> {
        let id: UserId = id.parse().map_err(|_| AppError::NotFound("profile"))?;
        self.view(id, false).await
    }

    /// Edits the caller's profile, or `target`'s when the caller is ADMIN.
    /// An empty string clears a field.
    pub async fn edit(
        &self,
        principal: &Principal,
        target: Option<&str>,
        payload: &Value,
    ) -> Result<Profile> {
        ensure_active(principal)?;
        let user = match target {
            Some(raw) => {
                require_role(principal, Role::Admin)?;
                raw.parse().map_err(|_| AppError::NotFound("profile"))?
            }
            None => principal.id,
        };

        let clean = check_fields(EDIT, payload).map_err(AppError::Validation)?;
        if clean.is_empty() {
            return Err(AppError::invalid(ValidationError::NothingToUpdate));
        }

        let mut profile = self
            .profiles
            .find_by_user(user)
            .await?
            .ok_or(AppError::NotFound("profile"))?;
        for (name, value) in clean.fields() {
            if let (Some(slot), CleanValue::Text(text)) = (profile.field_mut(name), value) {
                *slot = Some(text.clone()).filter(|t| !t.is_empty());
            }
        }

        self.profiles.replace(profile.clone()).await?;
        info!(user_id = %user, editor_id = %principal.id, "profile edited");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::models::{BanState, User};
    use domains::ports::{MockProfileRepository, MockUserRepository};
    use domains::Denial;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn principal(roles: &[Role]) -> Principal {
        Principal {
            id: UserId::new(),
            roles: roles.iter().copied().collect(),
            ban: BanState::default(),
        }
    }

    #[tokio::test]
    async fn edit_sets_and_clears_fields() {
        let caller = principal(&[Role::User]);
        let mut existing = Profile::empty(caller.id);
        existing.twitch = Some("old".into());

        let mut profiles = MockProfileRepository::new();
        profiles
            .expect_find_by_user()
            .returning(move |_| Ok(Some(existing.clone())));
        profiles
            .expect_replace()
            .withf(|p| p.bio.as_deref() == Some("hello") && p.twitch.is_none())
            .times(1)
            .returning(|_| Ok(()));

        let svc = ProfileService::new(Arc::new(MockUserRepository::new()), Arc::new(profiles));
        svc.edit(&caller, None, &json!({ "bio": "hello", "twitch": "" }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn editing_someone_else_requires_admin() {
        let svc = ProfileService::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockProfileRepository::new()),
        );
        let other = UserId::new().to_string();
        let result = svc
            .edit(&principal(&[Role::Author]), Some(&other), &json!({ "bio": "x" }))
            .await;
        assert!(matches!(
            result,
            Err(AppError::Forbidden(Denial::MissingRole(Role::Admin)))
        ));
    }

    #[tokio::test]
    async fn empty_edit_is_nothing_to_update() {
        let svc = ProfileService::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockProfileRepository::new()),
        );
        let result = svc
            .edit(&principal(&[Role::User]), None, &json!({ "unknown": "x" }))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn public_view_hides_email() {
        let now = Utc::now();
        let owner = User {
            id: UserId::new(),
            name: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            roles: BTreeSet::from([Role::User]),
            ban: BanState::default(),
            email_verified: true,
            verification: None,
            anonymized: false,
            created_at: now,
            updated_at: now,
        };
        let id = owner.id;
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(move |_| Ok(Some(owner.clone())));
        let mut profiles = MockProfileRepository::new();
        profiles
            .expect_find_by_user()
            .returning(|user| Ok(Some(Profile::empty(user))));

        let view = ProfileService::new(Arc::new(users), Arc::new(profiles))
            .of_user(&id.to_string())
            .await
            .unwrap();
        assert_eq!(view.name, "ada");
        assert!(view.email.is_none());
    }
}
