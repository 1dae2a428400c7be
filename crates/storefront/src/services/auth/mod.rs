//! Authentication service.
//!
//! Registration is a two-step flow: the customer asks for a confirmation code
//! for their email, then registers with username, email, code, and password.
//! Login is by username and password. Session handling lives in the routes.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::seq::IndexedRandom;
use sqlx::PgPool;
use tracing::{info, instrument};

use shop_online_core::{Email, Phone, UserId, Username};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::user::{ProfileUpdate, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Confirmation code length.
const CODE_LENGTH: usize = 6;

/// Characters a confirmation code is drawn from.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How long a confirmation code stays valid, in hours.
const CODE_TTL_HOURS: i64 = 24;

/// Longest accepted profile text field.
const MAX_PROFILE_FIELD: usize = 150;

/// Registration form.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub code: String,
    pub password: String,
}

/// Authentication service.
///
/// Handles confirmation codes, registration, login, and profile changes.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Issue a confirmation code for an unregistered email.
    ///
    /// Any previous code for the address is replaced. The code is returned so
    /// a delivery mechanism can send it; it is never logged.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::EmailTaken` if an account already uses the email.
    #[instrument(skip(self))]
    pub async fn request_code(&self, email: &str) -> Result<String, AuthError> {
        let email = Email::parse(email)?;

        if self.users.email_registered(&email).await? {
            return Err(AuthError::EmailTaken);
        }

        let code = generate_code();
        self.users.upsert_email_code(&email, &code).await?;
        info!(email = %email, "confirmation code issued");

        Ok(code)
    }

    /// Register a new user with a confirmation code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` / `AuthError::InvalidEmail` for bad formats.
    /// Returns `AuthError::InvalidCode` if the code doesn't match or has expired.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the username or email is taken.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        let username = Username::parse(&registration.username)?;
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;

        let stored = self
            .users
            .get_email_code(&email)
            .await?
            .ok_or(AuthError::InvalidCode)?;
        let code = registration.code.trim().to_ascii_uppercase();
        let expired = stored.created_at + Duration::hours(CODE_TTL_HOURS) < Utc::now();
        if stored.code != code || expired {
            return Err(AuthError::InvalidCode);
        }

        let password_hash = hash_password(&registration.password)?;

        let user = self
            .users
            .create_with_password(&username, &email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(what) => AuthError::UserAlreadyExists(what),
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Login with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the username/password is wrong.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = Username::parse(username).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Get a user's profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn profile(&self, id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update a user's contact fields. Phone numbers are normalized.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidPhone` or `AuthError::FieldTooLong` for bad input.
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, AuthError> {
        let update = normalize_profile(update)?;
        self.users
            .update_profile(id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }
}

/// Generate a confirmation code of uppercase letters and digits.
fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .filter_map(|_| CODE_ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect()
}

/// Trim profile fields, check lengths, and normalize a non-empty phone.
fn normalize_profile(update: ProfileUpdate) -> Result<ProfileUpdate, AuthError> {
    fn text(field: &'static str, value: Option<String>) -> Result<Option<String>, AuthError> {
        let Some(value) = value else {
            return Ok(None);
        };
        let value = value.trim().to_owned();
        if value.chars().count() > MAX_PROFILE_FIELD {
            return Err(AuthError::FieldTooLong {
                field,
                max: MAX_PROFILE_FIELD,
            });
        }
        Ok(Some(value))
    }

    let phone = match text("phone", update.phone)? {
        Some(phone) if !phone.is_empty() => Some(Phone::parse(&phone)?.to_string()),
        other => other,
    };

    Ok(ProfileUpdate {
        first_name: text("first_name", update.first_name)?,
        last_name: text("last_name", update.last_name)?,
        phone,
        address: text("address", update.address)?,
    })
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
