use anyhow::{Result, anyhow};
use console::style;

use crate::core::config::AppConfig;
use crate::core::oauth;
use crate::core::terminal::{print_error, print_step, print_success, print_warn};
use crate::core::vault::TokenStore;

/// Interactive authorization bootstrap for the short-video platform:
/// open the consent page, exchange the pasted code, persist the pair.
pub async fn run_auth_command(args: &[String]) -> Result<()> {
    if matches!(args.get(2).map(String::as_str), Some("--help") | Some("-h")) {
        print_help();
        return Ok(());
    }

    let config = AppConfig::load()?;
    let platform = config
        .platform
        .clone()
        .ok_or_else(|| anyhow!("[platform] section missing from reelbot.toml"))?;

    if platform.client_key.is_empty()
        || platform.client_secret.is_empty()
        || platform.redirect_uri.is_empty()
    {
        return Err(anyhow!(
            "platform.client_key, platform.client_secret and platform.redirect_uri must be set"
        ));
    }

    let state = oauth::generate_state();
    let auth_url = oauth::build_auth_url(&platform.client_key, &platform.redirect_uri, &state);

    print_step("Authorize the application");
    println!("\n  Open this URL in your browser:\n");
    println!("  {}\n", style(&auth_url).cyan());

    if open::that(&auth_url).is_err() {
        print_warn("Could not open the browser automatically");
    }

    let code = inquire::Text::new("Paste the authorization code:")
        .with_help_message("The code parameter from the redirect URL")
        .prompt()?;

    if code.trim().is_empty() {
        print_error("Authorization code cannot be empty.");
        return Ok(());
    }

    print_step("Exchanging authorization code for tokens...");
    let pair = oauth::exchange_code(
        &platform.client_key,
        &platform.client_secret,
        code.trim(),
        &platform.redirect_uri,
    )
    .await?;

    let store = TokenStore::new(platform.token_file.clone());
    store.persist(&pair).await?;

    print_success(&format!("Tokens saved to {}", store.path().display()));
    println!(
        "  You can now run: {}",
        style("reelbot run --publish-to tiktok").cyan()
    );
    println!("  Access tokens expire; rerun this command if publishing starts failing auth.");
    Ok(())
}

fn print_help() {
    println!(" {}", style("reelbot auth").bold());
    println!("   Runs the platform OAuth flow and stores the token pair.");
    println!();
    println!("   Requires [platform] client_key, client_secret and redirect_uri");
    println!("   in reelbot.toml. Tokens land in the configured token_file.");
    println!();
}
