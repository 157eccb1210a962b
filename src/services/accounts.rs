use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::entities::{
    order,
    user::{self, Entity as UserEntity, Role},
};
use crate::error::ApiError;
use crate::middleware::auth::{generate_token, TokenSettings};

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct Registration {
    #[validate(length(min = 1, max = 64, message = "First name is required"))]
    pub firstname: String,
    #[validate(length(min = 1, max = 64, message = "Last name is required"))]
    pub lastname: String,
    #[validate(regex(path = *crate::services::USERNAME_RE, message = "Username must be 3-32 letters, digits, dots, dashes or underscores"))]
    pub username: String,
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct Credentials {
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Deserialize, Validate, Debug, Clone, Default)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 64))]
    pub firstname: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub lastname: Option<String>,
    #[validate(regex(path = *crate::services::USERNAME_RE, message = "Username must be 3-32 letters, digits, dots, dashes or underscores"))]
    pub username: Option<String>,
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for Profile {
    fn from(value: user::Model) -> Self {
        Self {
            is_admin: value.is_admin(),
            id: value.id,
            firstname: value.firstname,
            lastname: value.lastname,
            username: value.username,
            email: value.email,
            created_at: value.created_at,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Session {
    #[serde(flatten)]
    pub profile: Profile,
    pub token: String,
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(format!("Failed to hash password: {err}")))
}

fn session_for(user: user::Model, tokens: &TokenSettings) -> Result<Session, ApiError> {
    let token = generate_token(tokens, user.id, user.role)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Session {
        profile: user.into(),
        token,
    })
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register(
    db: &DatabaseConnection,
    tokens: &TokenSettings,
    input: Registration,
) -> Result<Session, ApiError> {
    let email = normalize_email(&input.email);

    let taken = UserEntity::find()
        .filter(
            Condition::any()
                .add(user::Column::Email.eq(email.as_str()))
                .add(user::Column::Username.eq(input.username.as_str())),
        )
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    // A registration racing this one is caught by the unique indexes.
    let created = user::ActiveModel {
        firstname: Set(input.firstname),
        lastname: Set(input.lastname),
        username: Set(input.username),
        email: Set(email),
        password: Set(hash_password(&input.password)?),
        role: Set(Role::User),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| ApiError::conflict_on_constraint(err, "User already exists"))?;

    info!(user_id = created.id, "User registered");
    session_for(created, tokens)
}

pub async fn login(
    db: &DatabaseConnection,
    tokens: &TokenSettings,
    input: Credentials,
) -> Result<Session, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".into());

    let user = UserEntity::find()
        .filter(user::Column::Email.eq(normalize_email(&input.email)))
        .one(db)
        .await?
        .ok_or_else(invalid)?;

    user.check_hash(&input.password).map_err(|_| invalid())?;
    session_for(user, tokens)
}

pub async fn profile(db: &DatabaseConnection, user_id: i32) -> Result<Profile, ApiError> {
    UserEntity::find_by_id(user_id)
        .one(db)
        .await?
        .map(Profile::from)
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

/// Applies the non-empty fields of `input` and issues a fresh token.
pub async fn update_profile(
    db: &DatabaseConnection,
    tokens: &TokenSettings,
    user_id: i32,
    input: ProfileUpdate,
) -> Result<Session, ApiError> {
    let current = UserEntity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let email = input.email.as_deref().map(normalize_email);
    let mut clash = Condition::any();
    if let Some(email) = email.as_deref().filter(|email| *email != current.email) {
        clash = clash.add(user::Column::Email.eq(email));
    }
    if let Some(username) = input
        .username
        .as_deref()
        .filter(|username| *username != current.username)
    {
        clash = clash.add(user::Column::Username.eq(username));
    }
    if !clash.is_empty() {
        let taken = UserEntity::find()
            .filter(clash)
            .filter(user::Column::Id.ne(user_id))
            .one(db)
            .await?;
        if taken.is_some() {
            return Err(ApiError::Conflict("Email or username already in use".into()));
        }
    }

    let mut active: user::ActiveModel = current.into();
    if let Some(firstname) = input.firstname {
        active.firstname = Set(firstname);
    }
    if let Some(lastname) = input.lastname {
        active.lastname = Set(lastname);
    }
    if let Some(username) = input.username {
        active.username = Set(username);
    }
    if let Some(email) = email {
        active.email = Set(email);
    }
    if let Some(password) = input.password {
        active.password = Set(hash_password(&password)?);
    }

    let updated = active
        .update(db)
        .await
        .map_err(|err| ApiError::conflict_on_constraint(err, "Email or username already in use"))?;
    session_for(updated, tokens)
}

/// All accounts, newest first.
pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<Profile>, ApiError> {
    let users = UserEntity::find()
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id)
        .all(db)
        .await?;
    Ok(users.into_iter().map(Profile::from).collect())
}

/// Removes an account. Accounts that placed orders are kept so order history
/// stays attributable; an admin cannot remove their own account.
pub async fn delete_user(
    db: &DatabaseConnection,
    acting_admin: i32,
    user_id: i32,
) -> Result<(), ApiError> {
    if acting_admin == user_id {
        return Err(ApiError::Validation("You cannot delete your own account".into()));
    }

    let target = UserEntity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let orders = order::Entity::find()
        .filter(order::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    if orders > 0 {
        return Err(ApiError::Conflict(format!(
            "User has {orders} order(s) and cannot be removed"
        )));
    }

    // An order placed after the count is caught by the restricting foreign key.
    UserEntity::delete_by_id(target.id)
        .exec(db)
        .await
        .map_err(|err| ApiError::conflict_on_constraint(err, "User has orders and cannot be removed"))?;
    info!(user_id, acting_admin, "User removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_config, memory_db};

    fn tokens() -> TokenSettings {
        TokenSettings {
            secret: "unit-test-secret".into(),
            ttl_hours: 1,
        }
    }

    fn registration(username: &str, email: &str) -> Registration {
        Registration {
            firstname: "Jane".into(),
            lastname: "Doe".into(),
            username: username.into(),
            email: email.into(),
            password: "hunter22".into(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let db = memory_db().await;
        let session = register(&db, &tokens(), registration("jane", "Jane@Example.com"))
            .await
            .unwrap();
        assert_eq!(session.profile.email, "jane@example.com");
        assert!(!session.profile.is_admin);

        let login_session = login(
            &db,
            &tokens(),
            Credentials {
                email: "jane@example.com".into(),
                password: "hunter22".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(login_session.profile.id, session.profile.id);

        let wrong = login(
            &db,
            &tokens(),
            Credentials {
                email: "jane@example.com".into(),
                password: "nope".into(),
            },
        )
        .await;
        assert!(matches!(wrong, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn duplicate_email_or_username_conflicts() {
        let db = memory_db().await;
        register(&db, &tokens(), registration("jane", "jane@example.com"))
            .await
            .unwrap();

        assert!(matches!(
            register(&db, &tokens(), registration("jane2", "jane@example.com")).await,
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            register(&db, &tokens(), registration("jane", "other@example.com")).await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn profile_update_rehashes_password() {
        let db = memory_db().await;
        let session = register(&db, &tokens(), registration("jane", "jane@example.com"))
            .await
            .unwrap();

        let updated = update_profile(
            &db,
            &tokens(),
            session.profile.id,
            ProfileUpdate {
                lastname: Some("Smith".into()),
                password: Some("correct horse".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.profile.lastname, "Smith");
        assert_eq!(updated.profile.firstname, "Jane");

        assert!(login(
            &db,
            &tokens(),
            Credentials {
                email: "jane@example.com".into(),
                password: "correct horse".into(),
            },
        )
        .await
        .is_ok());
    }

    #[tokio::test]
    async fn admin_cannot_delete_self() {
        let db = memory_db().await;
        assert!(matches!(
            delete_user(&db, 1, 1).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            delete_user(&db, 1, 77).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();
        assert_ne!(first, second);

        let holder = user::Model {
            id: 1,
            firstname: "Jane".into(),
            lastname: "Doe".into(),
            username: "jane".into(),
            email: "jane@example.com".into(),
            password: first,
            role: Role::User,
            created_at: Utc::now(),
        };
        assert!(holder.check_hash("hunter22").is_ok());
        assert!(holder.check_hash("hunter23").is_err());
    }

    #[tokio::test]
    async fn mixed_case_admin_email_can_log_in() {
        let mut config = memory_config();
        config.admin_email = "  Admin@Grocery.COM ".into();
        let db = crate::init_database(&config).await.unwrap();

        let session = login(
            &db,
            &tokens(),
            Credentials {
                email: "admin@grocery.com".into(),
                password: config.admin_password.clone(),
            },
        )
        .await
        .unwrap();
        assert!(session.profile.is_admin);

        // Seeding again with the configured spelling finds the same account.
        crate::entities::primary_setup(&db, &config).await.unwrap();
        assert_eq!(list_users(&db).await.unwrap().len(), 1);
    }
}
