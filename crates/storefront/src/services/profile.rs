//! Signed-in user's profile.
//!
//! The API has moved its profile routes around over time, so both loading
//! and avatar upload try a list of known endpoints in order.

use mangaverse_core::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::api::ApiClient;
use crate::error::{ApiError, add_breadcrumb};

/// Endpoints returning the current user, in order of preference.
pub const PROFILE_PATHS: [&str; 5] = ["/me", "/usuario/me", "/usuarios/me", "/user/me", "/auth/me"];

/// Endpoints accepting an avatar upload, in order of preference.
pub const AVATAR_PATHS: [&str; 4] = ["/perfil/avatar", "/usuarios/avatar", "/user/avatar", "/me/avatar"];

pub const LOAD_FAILED_MESSAGE: &str = "Could not load profile data.";
pub const UPLOAD_FAILED_MESSAGE: &str = "Could not upload the avatar.";
const DEFAULT_DISPLAY_NAME: &str = "User";

/// Profile errors.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("no profile endpoint answered")]
    Unavailable,

    #[error("no avatar endpoint accepted the upload")]
    UploadFailed,

    #[error("invalid avatar file: {0}")]
    InvalidFile(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ProfileError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unavailable => LOAD_FAILED_MESSAGE.to_string(),
            Self::UploadFailed | Self::InvalidFile(_) => UPLOAD_FAILED_MESSAGE.to_string(),
            Self::Api(e) => e.user_message(LOAD_FAILED_MESSAGE),
        }
    }
}

/// The current user as the API describes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "avatarUrl", default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Profile {
    /// `nome`, else `name`, else "User".
    #[must_use]
    pub fn display_name(&self) -> &str {
        [&self.nome, &self.name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
    }
}

/// Avatar file picked by the user.
#[derive(Debug, Clone)]
pub struct AvatarFile {
    pub file_name: String,
    /// e.g. `image/png`
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Result of a successful avatar upload.
#[derive(Debug, Clone)]
pub struct AvatarUploaded {
    /// Endpoint that accepted the file.
    pub path: String,
    /// Absolute URL of the new avatar, when known.
    pub avatar_url: Option<String>,
    /// Profile reloaded after the upload, if the reload worked.
    pub profile: Option<Profile>,
}

/// Absolute avatar URL.
///
/// Absolute http(s) URLs are returned as given; anything else is a path on
/// the API server. Blank input has no URL.
#[must_use]
pub fn normalize_avatar_url(api_base: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(raw.to_string());
    }
    let base = api_base.trim_end_matches('/');
    if raw.starts_with('/') {
        Some(format!("{base}{raw}"))
    } else {
        Some(format!("{base}/{raw}"))
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "avatarUrl", default)]
    avatar_url: Option<String>,
}

/// Loads the profile and uploads avatars.
#[derive(Debug, Clone)]
pub struct ProfileService {
    api: ApiClient,
}

impl ProfileService {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Profile from the first endpoint that returns an object.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Unavailable` when no endpoint answers and
    /// `ProfileError::Api` when the session is rejected.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Profile, ProfileError> {
        let found = self
            .api
            .first_success(&PROFILE_PATHS, |body| match body {
                Value::Object(_) => serde_json::from_value::<Profile>(body).ok(),
                _ => None,
            })
            .await?;

        let (path, profile) = found.ok_or(ProfileError::Unavailable)?;
        debug!(path = %path, "Profile loaded");
        Ok(profile)
    }

    /// The profile's avatar as an absolute URL.
    #[must_use]
    pub fn avatar_url(&self, profile: &Profile) -> Option<String> {
        profile
            .avatar_url
            .as_deref()
            .and_then(|raw| normalize_avatar_url(self.api.base_url(), raw))
    }

    /// Upload a new avatar as multipart field `avatar`, then reload the
    /// profile.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::UploadFailed` when no endpoint accepts the
    /// file, `ProfileError::InvalidFile` when the MIME type is malformed,
    /// and `ProfileError::Api` when the session is rejected.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
    pub async fn upload_avatar(&self, file: &AvatarFile) -> Result<AvatarUploaded, ProfileError> {
        for path in AVATAR_PATHS {
            // A multipart body is consumed by sending it, so each attempt
            // builds its own.
            let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime)
                .map_err(|e| ProfileError::InvalidFile(e.to_string()))?;
            let form = reqwest::multipart::Form::new().part("avatar", part);

            match self.api.post_multipart(path, form).await {
                Ok(body) => {
                    let from_response = serde_json::from_value::<UploadResponse>(body)
                        .ok()
                        .and_then(|r| r.avatar_url);
                    let profile = match self.load().await {
                        Ok(profile) => Some(profile),
                        Err(e) => {
                            debug!(error = %e, "Profile reload after upload failed");
                            None
                        }
                    };
                    let avatar_url = from_response
                        .as_deref()
                        .and_then(|raw| normalize_avatar_url(self.api.base_url(), raw))
                        .or_else(|| profile.as_ref().and_then(|p| self.avatar_url(p)));

                    add_breadcrumb("profile", "Uploaded avatar", Some(&[("path", path)]));
                    info!(path, "Avatar uploaded");
                    return Ok(AvatarUploaded {
                        path: path.to_string(),
                        avatar_url,
                        profile,
                    });
                }
                Err(e) if e.is_terminal() => return Err(e.into()),
                Err(e) => debug!(path, error = %e, "Avatar endpoint failed, trying next"),
            }
        }
        Err(ProfileError::UploadFailed)
    }
}
