use anyhow::{Result, anyhow};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Deserialize;

use crate::core::vault::TokenPair;

pub const AUTH_URL: &str = "https://www.tiktok.com/v2/auth/authorize/";
pub const TOKEN_URL: &str = "https://open.tiktokapis.com/v2/oauth/token/";
pub const SCOPES: &str = "user.info.basic,video.publish";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

pub fn build_auth_url(client_key: &str, redirect_uri: &str, state: &str) -> String {
    format!(
        "{}?client_key={}&scope={}&response_type=code&redirect_uri={}&state={}",
        AUTH_URL,
        urlencoding::encode(client_key),
        urlencoding::encode(SCOPES),
        urlencoding::encode(redirect_uri),
        state
    )
}

/// Exchange an authorization code for the initial token pair.
pub async fn exchange_code(
    client_key: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenPair> {
    let params = [
        ("client_key", client_key),
        ("client_secret", client_secret),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri),
    ];
    request_tokens(&params).await
}

/// Trade a refresh token for a fresh access/refresh pair.
pub async fn refresh_tokens(
    client_key: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenPair> {
    let params = [
        ("client_key", client_key),
        ("client_secret", client_secret),
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];
    request_tokens(&params).await
}

async fn request_tokens(params: &[(&str, &str)]) -> Result<TokenPair> {
    let client = reqwest::Client::new();

    let response = client
        .post(TOKEN_URL)
        .form(params)
        .send()
        .await
        .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| anyhow!("Failed to read response body: {}", e))?;

    if !status.is_success() {
        return Err(anyhow!("Token request failed (HTTP {}): {}", status, body));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| anyhow!("Failed to parse token response: {}", e))?;

    if let Some(error) = token.error {
        let desc = token.error_description.unwrap_or_default();
        return Err(anyhow!("OAuth error: {} - {}", error, desc));
    }

    match (token.access_token, token.refresh_token) {
        (Some(access_token), Some(refresh_token)) => Ok(TokenPair {
            access_token,
            refresh_token,
        }),
        _ => Err(anyhow!("Response missing tokens. Response was: {}", body)),
    }
}
