//! Account listing and selection.

use ad_console_core::AccountId;

use super::{CliError, Context};

/// Print the accounts, marking the selected one.
///
/// # Errors
///
/// [`CliError::NotLoggedIn`].
pub fn list(ctx: &Context) -> Result<(), CliError> {
    let state = ctx.logged_in()?;
    if let Some(error) = state.accounts_error() {
        println!("Accounts unavailable: {error}");
        return Ok(());
    }
    if state.accounts().is_empty() {
        println!("No accounts");
        return Ok(());
    }

    let current = state.current_account_id();
    for account in state.accounts() {
        let marker = if Some(account.id) == current { '*' } else { ' ' };
        let role = account.user_role.map_or("", |r| r.label());
        println!(
            "{marker} {:>6}  {:<32} {:>14}  {role}",
            account.id.as_i64(),
            account.label(),
            ad_console::filters::format_money(account.balance),
        );
    }
    Ok(())
}

/// # Errors
///
/// [`CliError::Session`] if the account is not one of the user's.
pub async fn switch(ctx: &Context, id: i64) -> Result<(), CliError> {
    ctx.logged_in()?;
    let account = ctx
        .manager
        .switch_account(&ctx.storage, AccountId::new(id))
        .await?;
    println!("Switched to {}", account.label());
    Ok(())
}
