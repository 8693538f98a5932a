//! Signup, login and logout handlers.

use anyhow::Result;
use handy_core::pages;
use handy_core::session::{FileSessionStore, SessionStore};
use handy_core::workflow::{FormWorkflow, PageSpec};

use super::run_form;
use crate::cli::App;

#[derive(clap::Args)]
pub struct SignupArgs {
    /// Full name
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
}

async fn signup(app: &App, page: PageSpec, args: SignupArgs) -> Result<()> {
    let mut workflow = FormWorkflow::new(page, app.client.clone());
    workflow.set_field("full_name", args.name);
    workflow.set_field("email", args.email);
    workflow.set_field("password", args.password);
    run_form(app, workflow).await
}

pub async fn signup_customer(app: &App, args: SignupArgs) -> Result<()> {
    signup(app, pages::customer_signup(&app.config), args).await
}

pub async fn signup_provider(app: &App, args: SignupArgs) -> Result<()> {
    signup(app, pages::provider_signup(&app.config), args).await
}

pub async fn login(app: &App, email: String, password: String) -> Result<()> {
    let mut workflow = FormWorkflow::new(pages::provider_login(&app.config), app.client.clone());
    workflow.set_field("username", email);
    workflow.set_field("password", password);
    run_form(app, workflow).await
}

pub fn logout(store: &FileSessionStore) -> Result<()> {
    if store.snapshot().is_empty() {
        println!("Not logged in (no session found).");
        return Ok(());
    }
    store.clear_all()?;
    println!("✓ Logged out");
    println!("  Session cleared in: {}", store.path().display());
    Ok(())
}
