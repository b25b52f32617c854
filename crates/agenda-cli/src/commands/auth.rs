//! Authentication commands.

use agenda_auth::{AuthError, AuthSession, IdentityProvider};
use agenda_core::UserProfile;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::error::{ClientError, ClientResult};

/// Sign in with a refresh token from the Google consent flow.
///
/// Stores the refresh token, mints a first access token and fetches the
/// profile, the way the login screen does after an interactive sign-in.
pub async fn login(ctx: &AppContext, refresh_token: &str) -> ClientResult<()> {
    ctx.identity.sign_in_with_refresh_token(refresh_token)?;

    let tokens = ctx.identity.get_tokens().await.map_err(ClientError::Login)?;
    let Some(access_token) = tokens.usable_access_token() else {
        return Err(ClientError::Login(AuthError::authentication(
            "Google returned no access token",
        )));
    };

    let profile = match ctx.identity.fetch_profile(access_token).await {
        Ok(profile) => Some(profile),
        Err(e) => {
            warn!(error = %e, "could not fetch user profile");
            None
        }
    };

    ctx.session.sign_in(access_token, profile.as_ref()).await?;
    info!("Google sign-in successful");

    match profile {
        Some(ref profile) => println!("Signed in as {}.", describe(profile)),
        None => println!("Signed in."),
    }
    Ok(())
}

/// Sign out and forget the local session.
pub async fn logout(session: &AuthSession) -> ClientResult<()> {
    let report = session.logout().await;
    println!("Signed out.");
    if !report.remote_signed_out {
        println!("Google could not be reached; the local session was cleared anyway.");
    }
    Ok(())
}

/// Show whether a session is stored.
pub async fn status(ctx: &AppContext, json: bool) -> ClientResult<()> {
    let authenticated = ctx.session.is_authenticated().await;
    let refreshable = ctx.identity.is_signed_in().await?;
    let profile = ctx.session.user_profile().await;

    if json {
        let status = serde_json::json!({
            "authenticated": authenticated,
            "refreshable": refreshable,
            "user": profile,
            "refresh_policy": ctx.session.refresh_policy(),
        });
        println!("{}", status);
        return Ok(());
    }

    if authenticated {
        match profile {
            Some(ref profile) => println!("Signed in as {}.", describe(profile)),
            None => println!("Signed in."),
        }
    } else {
        println!("Not signed in.");
    }
    if !refreshable {
        println!("No Google refresh token stored; run `agenda login` to sign in.");
    }
    Ok(())
}

/// Show the signed-in user.
pub async fn whoami(ctx: &AppContext, json: bool) -> ClientResult<()> {
    if !ctx.session.is_authenticated().await {
        return Err(ClientError::NotSignedIn);
    }
    let Some(profile) = ctx.session.user_profile().await else {
        println!("Signed in, but no profile is stored.");
        return Ok(());
    };

    if json {
        let rendered = serde_json::to_string_pretty(&profile)
            .map_err(|e| ClientError::InvalidInput(format!("failed to render JSON: {}", e)))?;
        println!("{}", rendered);
    } else {
        println!("{}", profile.display_name());
        if let Some(ref email) = profile.email {
            println!("{}", email);
        }
    }
    Ok(())
}

fn describe(profile: &UserProfile) -> String {
    match profile.email {
        Some(ref email) if profile.name.is_some() => {
            format!("{} <{}>", profile.display_name(), email)
        }
        _ => profile.display_name().to_string(),
    }
}
