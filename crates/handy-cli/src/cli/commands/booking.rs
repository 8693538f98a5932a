//! Booking handler.

use std::path::PathBuf;

use anyhow::{Result, bail};
use handy_core::blob::Blob;
use handy_core::pages;
use handy_core::workflow::FormWorkflow;

use super::run_form;
use crate::cli::App;

#[derive(clap::Args)]
pub struct BookArgs {
    #[arg(long, value_name = "PROVIDER_ID")]
    pub provider: Option<String>,
    /// Defaults to the user id stored in the session
    #[arg(long, value_name = "USER_ID")]
    pub user: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub date: String,
    /// HH:MM
    #[arg(long)]
    pub time: String,
    #[arg(long)]
    pub location: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Photo of the job (repeatable, up to three)
    #[arg(long = "image", value_name = "IMAGE")]
    pub images: Vec<PathBuf>,
}

pub async fn run(app: &App, args: BookArgs) -> Result<()> {
    let mut workflow = FormWorkflow::new(pages::booking(&app.config), app.client.clone());
    if let Some(provider) = args.provider {
        workflow.set_field("provider_id", provider);
    }
    if let Some(user) = args.user {
        workflow.set_field("user_id", user);
    }
    workflow.set_field("date", args.date);
    workflow.set_field("time", args.time);
    workflow.set_field("location", args.location);
    if let Some(description) = args.description {
        workflow.set_field("description", description);
    }

    for path in &args.images {
        let blob = Blob::from_path(path)?;
        if !workflow.add_attachment(blob) {
            let warning = workflow.state().warning.clone().unwrap_or_default();
            bail!("{warning}");
        }
    }

    run_form(app, workflow).await
}
