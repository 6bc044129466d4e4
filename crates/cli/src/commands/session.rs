//! Login and logout

use anyhow::Result;
use chrono::Utc;

use crate::client::ApiClient;
use crate::config::Config;
use crate::output::{print_info, print_success};

/// Exchange credentials for a token and remember it for `api_url`
pub async fn login(api_url: &str, username: &str, password: &str) -> Result<()> {
    let client = ApiClient::new(api_url)?;
    let token = client.login(username, password).await?;

    let mut config = Config::load()?;
    config.api_url = Some(api_url.to_string());
    config.access_token = Some(token);
    config.username = Some(username.to_string());
    config.logged_in_at = Some(Utc::now());
    config.save()?;

    print_success(&format!("Logged in to {} as {}", api_url, username));
    print_info(&format!(
        "Token saved to {}",
        Config::config_path()?.display()
    ));
    Ok(())
}

pub fn logout() -> Result<()> {
    let mut config = Config::load()?;
    if config.access_token.take().is_none() {
        print_info("Not logged in");
        return Ok(());
    }
    config.logged_in_at = None;
    config.save()?;

    print_success("Logged out");
    Ok(())
}
