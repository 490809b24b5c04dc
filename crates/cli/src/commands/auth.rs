//! Login, logout and profile commands.

use ad_console::api::Credentials;

use super::{CliError, Context};

/// Log in and show the selected account.
///
/// # Errors
///
/// Returns [`CliError::Session`] when the backend rejects the credentials.
pub async fn login(ctx: &Context, username: &str, password: &str) -> Result<(), CliError> {
    let credentials = Credentials::new(username, password);
    let user = ctx.manager.login(&ctx.backend(), &credentials).await?;
    println!("Logged in as {} ({})", user.name, user.role.label());

    let state = ctx.state();
    match state.current_account() {
        Some(account) => println!("Account: {}", account.label()),
        None => match state.accounts_error() {
            Some(error) => println!("Accounts unavailable: {error}"),
            None => println!("No accounts"),
        },
    }
    Ok(())
}

/// # Errors
///
/// Returns [`CliError::Session`] if the state file cannot be cleared.
pub async fn logout(ctx: &Context) -> Result<(), CliError> {
    if !ctx.state().is_logged_in() {
        println!("Not logged in");
        return Ok(());
    }
    ctx.manager.logout(&ctx.backend()).await?;
    println!("Logged out");
    Ok(())
}

/// # Errors
///
/// [`CliError::NotLoggedIn`].
pub fn whoami(ctx: &Context) -> Result<(), CliError> {
    let state = ctx.logged_in()?;
    let Some(user) = state.user() else {
        return Err(CliError::NotLoggedIn);
    };
    println!("{} (id {})", user.name, user.id);
    if let Some(username) = &user.username {
        println!("Username: {username}");
    }
    if let Some(email) = &user.email {
        println!("E-mail:   {email}");
    }
    println!("Role:     {}", user.role.label());
    if let Some(account) = state.current_account() {
        println!("Account:  {}", account.label());
    }
    Ok(())
}
