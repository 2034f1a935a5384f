use anyhow::{Result, anyhow};
use argon2::Argon2;
use argon2::password_hash::{PasswordHasher, SaltString};
use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};
use uuid::Uuid;

use crate::models::auth::{AuthDocument, NotificationSettings, SocialLinks, UserProfile};

pub const U_ID_DIGITS: usize = 12;
pub const MAX_USERNAME_LEN: usize = 64;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MIN_PASSWORD_LEN: usize = 4;
pub const MAX_PASSWORD_LEN: usize = 64;
pub const MAX_AVATAR_COLOR_LEN: usize = 32;

const _: () = assert!(U_ID_DIGITS <= 18);

/// Identifiers minted for one signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupIds {
    pub auth_id: Uuid,
    pub profile_id: Uuid,
    pub u_id: String,
}

impl SignupIds {
    pub fn generate() -> Self {
        Self {
            auth_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            u_id: generate_u_id(),
        }
    }
}

/// Lowercases the whole value, then upper-cases the first letter of every
/// space separated word.
pub fn first_letter_uppercase(value: &str) -> String {
    value
        .to_lowercase()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn lowercase(value: &str) -> String {
    value.to_lowercase()
}

/// Random decimal id of exactly [`U_ID_DIGITS`] digits; the leading digit is
/// never zero so the value round-trips through integer parsing.
pub fn generate_u_id() -> String {
    let mut rng = rand::rng();
    let mut id = String::with_capacity(U_ID_DIGITS);
    id.push(char::from(b'0' + rng.random_range(1..=9u8)));
    for _ in 1..U_ID_DIGITS {
        id.push(char::from(b'0' + rng.random_range(0..=9u8)));
    }
    assert_eq!(id.len(), U_ID_DIGITS, "Generated uId has wrong width");
    id
}

pub fn build_auth_document(
    ids: &SignupIds,
    username: &str,
    email: &str,
    password: &str,
    avatar_color: &str,
    created_at: DateTime<Utc>,
) -> AuthDocument {
    AuthDocument {
        id: ids.auth_id,
        u_id: ids.u_id.clone(),
        username: first_letter_uppercase(username),
        email: lowercase(email),
        password: password.to_string(),
        avatar_color: avatar_color.to_string(),
        created_at,
    }
}

pub fn build_user_profile(
    auth: &AuthDocument,
    profile_id: Uuid,
    profile_picture: String,
) -> UserProfile {
    UserProfile {
        id: profile_id,
        auth_id: auth.id,
        u_id: auth.u_id.clone(),
        username: auth.username.clone(),
        email: auth.email.clone(),
        avatar_color: auth.avatar_color.clone(),
        profile_picture,
        posts_count: 0,
        followers_count: 0,
        following_count: 0,
        blocked: Vec::new(),
        blocked_by: Vec::new(),
        notifications: NotificationSettings::default(),
        social: SocialLinks::default(),
        work: String::new(),
        school: String::new(),
        location: String::new(),
        quote: String::new(),
        bg_image_version: String::new(),
        bg_image_id: String::new(),
        created_at: auth.created_at,
    }
}

/// Hashes a password into an Argon2id PHC string with a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|err| anyhow!("Failed to encode password salt: {err}"))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("Failed to hash password: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    #[test]
    fn capitalizes_each_word() {
        assert_eq!(first_letter_uppercase("bob"), "Bob");
        assert_eq!(first_letter_uppercase("bOB"), "Bob");
        assert_eq!(first_letter_uppercase("mary ANN"), "Mary Ann");
        assert_eq!(first_letter_uppercase(""), "");
    }

    #[test]
    fn lowercases_email() {
        assert_eq!(lowercase("BOB@X.COM"), "bob@x.com");
    }

    #[test]
    fn u_id_is_twelve_digits_without_leading_zero() {
        for _ in 0..64 {
            let id = generate_u_id();
            assert_eq!(id.len(), U_ID_DIGITS);
            assert!(id.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(id.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn generated_ids_are_distinct() {
        let ids = SignupIds::generate();
        assert_ne!(ids.auth_id, ids.profile_id);
    }

    #[test]
    fn auth_document_normalizes_credentials() {
        let ids = SignupIds::generate();
        let now = Utc::now();
        let document = build_auth_document(&ids, "bob", "BOB@X.COM", "Secret1", "red", now);
        assert_eq!(document.id, ids.auth_id);
        assert_eq!(document.u_id, ids.u_id);
        assert_eq!(document.username, "Bob");
        assert_eq!(document.email, "bob@x.com");
        assert_eq!(document.password, "Secret1");
        assert_eq!(document.created_at, now);
    }

    #[test]
    fn profile_starts_with_defaults() {
        let ids = SignupIds::generate();
        let auth = build_auth_document(&ids, "alice", "alice@x.com", "pw12", "blue", Utc::now());
        let profile = build_user_profile(&auth, ids.profile_id, "https://img/v1/p".to_string());

        assert_eq!(profile.id, ids.profile_id);
        assert_eq!(profile.auth_id, auth.id);
        assert_eq!(profile.u_id, auth.u_id);
        assert_eq!(profile.username, "Alice");
        assert_eq!(profile.profile_picture, "https://img/v1/p");
        assert_eq!(profile.posts_count, 0);
        assert_eq!(profile.followers_count, 0);
        assert_eq!(profile.following_count, 0);
        assert!(profile.blocked.is_empty());
        assert!(profile.blocked_by.is_empty());
        assert!(profile.notifications.messages);
        assert!(profile.notifications.follows);
        assert!(profile.social.twitter.is_empty());
        assert!(profile.quote.is_empty());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter22").expect("hash succeeds");
        assert!(hash.starts_with("$argon2id$"));
        let parsed = PasswordHash::new(&hash).expect("valid PHC string");
        assert!(
            Argon2::default()
                .verify_password(b"hunter22", &parsed)
                .is_ok()
        );
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }
}
