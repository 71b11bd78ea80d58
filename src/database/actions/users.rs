use potion::HtmlError;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionData},
        permissions::ActionType,
    },
    constants::{EMAIL_MAX_LENGTH, PERSON_NAME_MAX_LENGTH, USERNAME_MAX_LENGTH},
    error::{query_error, ConflictError, NotFoundError, TypeError},
    form::{check_length, Form},
    pagination::{Page, PageContext},
    schema::{Id, User, UserProfile, UserRole, UserRow},
};

use super::subscribed_author_ids;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Profile fields to change; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

fn check_username(username: &str) -> Result<(), TypeError> {
    if username.is_empty() || username.chars().count() > USERNAME_MAX_LENGTH {
        return Err(TypeError::new(&format!(
            "Username must be between 1 and {USERNAME_MAX_LENGTH} characters"
        )));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), TypeError> {
    if !email.contains('@') || email.chars().count() > EMAIL_MAX_LENGTH {
        return Err(TypeError::new("Enter a valid email address"));
    }
    Ok(())
}

fn check_person_name(key: &str, name: &str) -> Result<(), TypeError> {
    check_length(key, name, PERSON_NAME_MAX_LENGTH)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string())
}

impl TryFrom<&Form> for NewUser {
    type Error = TypeError;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        let user = Self {
            email: form.get_str("email")?.trim().to_string(),
            username: form.get_str("username")?.trim().to_string(),
            first_name: form.get_optional_str("first_name")?.unwrap_or_default(),
            last_name: form.get_optional_str("last_name")?.unwrap_or_default(),
            password: form.get_str("password")?,
        };

        check_username(&user.username)?;
        check_email(&user.email)?;
        check_person_name("first_name", &user.first_name)?;
        check_person_name("last_name", &user.last_name)?;
        if user.password.is_empty() {
            return Err(TypeError::new("Password must not be empty"));
        }

        Ok(user)
    }
}

impl TryFrom<&Form> for UserUpdate {
    type Error = TypeError;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        let update = Self {
            email: trimmed(form.get_optional_str("email")?),
            username: trimmed(form.get_optional_str("username")?),
            first_name: form.get_optional_str("first_name")?,
            last_name: form.get_optional_str("last_name")?,
        };

        if let Some(username) = update.username.as_deref() {
            check_username(username)?;
        }
        if let Some(email) = update.email.as_deref() {
            check_email(email)?;
        }
        if let Some(first_name) = update.first_name.as_deref() {
            check_person_name("first_name", first_name)?;
        }
        if let Some(last_name) = update.last_name.as_deref() {
            check_person_name("last_name", last_name)?;
        }

        Ok(update)
    }
}

pub async fn get_user(
    pool: &Pool<Postgres>,
    username: &str,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(query_error)?;

    Ok(row)
}

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(query_error)?;

    Ok(row)
}

pub async fn require_user(pool: &Pool<Postgres>, user_id: Id) -> Result<User, potion::Error> {
    get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| NotFoundError::new("user", user_id).into())
}

/// Creates a user; the password is stored as an argon2 hash.
pub async fn register_user(
    user: &NewUser,
    role: UserRole,
    pool: &Pool<Postgres>,
) -> Result<User, potion::Error> {
    let password = hash_password(&user.password).map_err(|e| {
        log::error!("Failed to hash password: {e}");
        HtmlError::InternalServerError.new("Failed to hash password")
    })?;

    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(password)
    .bind(role)
    .fetch_optional(pool)
    .await
    .map_err(query_error)?;

    match row {
        Some(row) => {
            log::info!("Registered user {} ({})", row.username, row.id);
            Ok(row)
        }
        None => Err(ConflictError::new("A user with that username already exists").into()),
    }
}

/// Creates the administrator unless a user with that username already exists.
pub async fn ensure_admin(user: &NewUser, pool: &Pool<Postgres>) -> Result<User, potion::Error> {
    if let Some(existing) = get_user(pool, &user.username).await? {
        if existing.role != UserRole::Admin {
            log::warn!(
                "User {} exists but is not an administrator",
                existing.username
            );
        }
        return Ok(existing);
    }

    register_user(user, UserRole::Admin, pool).await
}

/// Changes the caller's own profile. Taking another user's username is a conflict.
pub async fn update_user(
    session: &SessionData,
    update: &UserUpdate,
    pool: &Pool<Postgres>,
) -> Result<User, potion::Error> {
    session.authenticate(ActionType::ManageOwnAccount)?;

    let row: Option<User> = sqlx::query_as(
        "
        UPDATE users
        SET email = COALESCE($1, email),
            username = COALESCE($2, username),
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name)
        WHERE id = $5
        RETURNING *
    ",
    )
    .bind(&update.email)
    .bind(&update.username)
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(session.user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
            potion::Error::from(ConflictError::new("A user with that username already exists"))
        } else {
            query_error(e)
        }
    })?;

    let user = row.ok_or_else(|| NotFoundError::new("user", session.user_id))?;
    log::info!("User {} updated their profile", user.id);

    Ok(user)
}

/// Removes the caller's account; recipes, favorites, cart entries and
/// subscriptions go with it.
pub async fn delete_user(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnAccount)?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(session.user_id)
        .execute(pool)
        .await
        .map_err(query_error)?;

    if result.rows_affected() == 0 {
        return Err(NotFoundError::new("user", session.user_id).into());
    }

    log::info!("User {} deleted their account", session.user_id);
    Ok(())
}

pub async fn login_user(
    username: &str,
    password: &str,
    secret: &[u8],
    ttl_hours: i64,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    let user = match get_user(pool, username).await? {
        Some(user) => user,
        None => return Err(HtmlError::InvalidRequest.new("Invalid credentials")),
    };

    let authenticated = verify_password(password, &user.password).map_err(|e| {
        log::error!("Unreadable password hash for user {}: {e}", user.id);
        HtmlError::InternalServerError.new("Failed to verify credentials")
    })?;
    if !authenticated {
        return Err(HtmlError::InvalidRequest.new("Invalid credentials"));
    }

    generate_jwt_session(&user, secret, ttl_hours)
}

pub async fn fetch_users(
    page: Page,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserProfile>, potion::Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT id, email, username, first_name, last_name, COUNT(*) OVER() AS count
        FROM users
        ORDER BY id
        LIMIT $1 OFFSET $2
    ",
    )
    .bind(page.size)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(query_error)?;

    if rows.is_empty() {
        let total_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .map_err(query_error)?;
        return Ok(PageContext::no_rows(total_count.0, page));
    }

    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let subscribed = subscribed_author_ids(viewer, &ids, pool).await?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, page);

    Ok(page.map(|row| {
        let is_subscribed = subscribed.contains(&row.id);
        UserProfile::from_row(row, is_subscribed)
    }))
}

pub async fn get_user_profile(
    user_id: Id,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, potion::Error> {
    let user = require_user(pool, user_id).await?;
    let subscribed = subscribed_author_ids(viewer, &[user.id], pool).await?;
    let is_subscribed = subscribed.contains(&user.id);

    Ok(UserProfile::from_user(user, is_subscribed))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_registration_form() {
        let form = Form::from_value(json!({
            "email": " cook@example.com ",
            "username": "cook",
            "password": "hunter2"
        }))
        .unwrap();

        let user = NewUser::try_from(&form).unwrap();
        assert_eq!(user.email, "cook@example.com");
        assert_eq!(user.first_name, "");
    }

    #[test]
    fn rejects_invalid_registration() {
        let no_at = Form::from_value(json!({
            "email": "cook.example.com",
            "username": "cook",
            "password": "hunter2"
        }))
        .unwrap();
        assert!(NewUser::try_from(&no_at).is_err());

        let no_password = Form::from_value(json!({
            "email": "cook@example.com",
            "username": "cook",
            "password": ""
        }))
        .unwrap();
        assert!(NewUser::try_from(&no_password).is_err());
    }

    #[test]
    fn rejects_oversized_registration_fields() {
        let long_first_name = Form::from_value(json!({
            "email": "cook@example.com",
            "username": "cook",
            "first_name": "A".repeat(151),
            "password": "hunter2"
        }))
        .unwrap();
        assert!(NewUser::try_from(&long_first_name).is_err());

        let long_last_name = Form::from_value(json!({
            "email": "cook@example.com",
            "username": "cook",
            "last_name": "C".repeat(151),
            "password": "hunter2"
        }))
        .unwrap();
        assert!(NewUser::try_from(&long_last_name).is_err());

        let long_email = Form::from_value(json!({
            "email": format!("{}@example.com", "c".repeat(250)),
            "username": "cook",
            "password": "hunter2"
        }))
        .unwrap();
        assert!(NewUser::try_from(&long_email).is_err());
    }

    #[test]
    fn parses_partial_profile_update() {
        let form = Form::from_value(json!({
            "username": " chef ",
            "last_name": "Cook"
        }))
        .unwrap();

        let update = UserUpdate::try_from(&form).unwrap();
        assert_eq!(
            update,
            UserUpdate {
                username: Some(String::from("chef")),
                last_name: Some(String::from("Cook")),
                ..Default::default()
            }
        );
    }

    #[test]
    fn rejects_invalid_profile_update() {
        let blank_username = Form::from_value(json!({"username": "  "})).unwrap();
        assert!(UserUpdate::try_from(&blank_username).is_err());

        let bad_email = Form::from_value(json!({"email": "chef"})).unwrap();
        assert!(UserUpdate::try_from(&bad_email).is_err());

        let long_name = Form::from_value(json!({"first_name": "A".repeat(151)})).unwrap();
        assert!(UserUpdate::try_from(&long_name).is_err());
    }
}
