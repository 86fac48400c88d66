//! Profile commands.

use std::path::Path;

use mangaverse_storefront::services::profile::{AvatarFile, ProfileError};
use mangaverse_storefront::{AppState, Route};

use super::CliError;
use crate::output;

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

pub async fn show(state: &AppState) -> Result<(), CliError> {
    state.guard().require_user(Route::Profile)?;
    let profile = state.profile().load().await?;
    let avatar = state.profile().avatar_url(&profile);
    output::profile(&profile, avatar.as_deref());
    Ok(())
}

pub async fn avatar(state: &AppState, path: &Path) -> Result<(), CliError> {
    state.guard().require_user(Route::Profile)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ProfileError::InvalidFile(format!("{}: {e}", path.display())))?;
    let file = AvatarFile {
        file_name: path
            .file_name()
            .map_or_else(|| "avatar".to_string(), |n| n.to_string_lossy().into_owned()),
        mime: mime_for(path).to_string(),
        bytes,
    };

    let uploaded = state.profile().upload_avatar(&file).await?;
    output::line("Avatar uploaded.");
    if let Some(profile) = &uploaded.profile {
        output::profile(profile, uploaded.avatar_url.as_deref());
    }
    Ok(())
}
