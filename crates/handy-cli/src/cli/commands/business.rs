//! Provider business-details handler.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use handy_core::blob::Blob;
use handy_core::pages;
use handy_core::workflow::FormWorkflow;

use super::run_form;
use crate::cli::App;

#[derive(clap::Args)]
pub struct BusinessArgs {
    #[arg(long)]
    pub business_name: String,
    /// Free-form service type, e.g. "Home Repair"
    #[arg(long)]
    pub service_type: String,
    #[arg(long)]
    pub hourly_rate: String,
    #[arg(long)]
    pub location: String,
    /// e.g. "Mon-Fri 08:00-17:00"
    #[arg(long)]
    pub working_hours: String,
    /// Scan of the front of your ID document
    #[arg(long, value_name = "IMAGE")]
    pub front_id: PathBuf,
    /// Scan of the back of your ID document
    #[arg(long, value_name = "IMAGE")]
    pub back_id: PathBuf,
    #[arg(long, value_name = "IMAGE")]
    pub photo: PathBuf,
}

fn attach(workflow: &mut FormWorkflow, field: &str, path: &Path) -> Result<()> {
    let blob = Blob::from_path(path)?;
    if !workflow.set_file(field, blob) {
        let warning = workflow.state().warning.clone().unwrap_or_default();
        bail!("{warning}");
    }
    Ok(())
}

pub async fn run(app: &App, args: BusinessArgs) -> Result<()> {
    let mut workflow = FormWorkflow::new(pages::business_details(&app.config), app.client.clone());
    workflow.set_field("business_name", args.business_name);
    workflow.set_field("service_type", args.service_type);
    workflow.set_field("hourly_rate", args.hourly_rate);
    workflow.set_field("location", args.location);
    workflow.set_field("working_hours", args.working_hours);
    attach(&mut workflow, "sa_front_id", &args.front_id)?;
    attach(&mut workflow, "sa_back_id", &args.back_id)?;
    attach(&mut workflow, "profile_photo", &args.photo)?;
    run_form(app, workflow).await
}
