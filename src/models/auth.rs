use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidateEmail, ValidationError};

use crate::auth::{
    MAX_AVATAR_COLOR_LEN, MAX_EMAIL_LEN, MAX_PASSWORD_LEN, MAX_USERNAME_LEN, MIN_PASSWORD_LEN,
    first_letter_uppercase, lowercase,
};

/// Signup body as posted by clients.
///
/// Missing fields deserialize to empty strings so the validation gate can
/// report them with a field-specific message instead of a serde error.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[serde(default)]
    #[validate(custom(function = "validate_email"))]
    pub email: String,
    #[serde(default)]
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    #[serde(default)]
    #[validate(custom(function = "validate_avatar_color"))]
    pub avatar_color: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Avatar image is required"))]
    pub avatar_image: String,
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(invalid("username", "Username is a required field"));
    }
    // Bounds apply to the stored form; lowercasing can lengthen a value.
    if first_letter_uppercase(username).chars().count() > MAX_USERNAME_LEN {
        return Err(invalid("username", "Invalid username"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(invalid("email", "Email is a required field"));
    }
    if !email.validate_email() || lowercase(email).chars().count() > MAX_EMAIL_LEN {
        return Err(invalid("email", "Email must be valid"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(invalid("password", "Password is a required field"));
    }
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(invalid("password", "Invalid password"));
    }
    Ok(())
}

fn validate_avatar_color(color: &str) -> Result<(), ValidationError> {
    if color.trim().is_empty() {
        return Err(invalid("avatar_color", "Avatar color is required"));
    }
    if color.chars().count() > MAX_AVATAR_COLOR_LEN {
        return Err(invalid("avatar_color", "Invalid avatar color"));
    }
    Ok(())
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

/// Identity record as returned to clients. The password never leaves the
/// process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub u_id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub avatar_color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub auth_id: Uuid,
    pub u_id: String,
    pub username: String,
    pub email: String,
    pub avatar_color: String,
    pub profile_picture: String,
    pub posts_count: u64,
    pub followers_count: u64,
    pub following_count: u64,
    pub blocked: Vec<Uuid>,
    pub blocked_by: Vec<Uuid>,
    pub notifications: NotificationSettings,
    pub social: SocialLinks,
    pub work: String,
    pub school: String,
    pub location: String,
    pub quote: String,
    pub bg_image_version: String,
    pub bg_image_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationSettings {
    pub messages: bool,
    pub reactions: bool,
    pub comments: bool,
    pub follows: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            messages: true,
            reactions: true,
            comments: true,
            follows: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SocialLinks {
    pub facebook: String,
    pub instagram: String,
    pub twitter: String,
    pub youtube: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupIdentityResponse {
    pub message: &'static str,
    pub auth_data: AuthDocument,
}

#[derive(Debug, Serialize)]
pub struct SignupProfileResponse {
    pub message: &'static str,
    pub user: UserProfile,
}
