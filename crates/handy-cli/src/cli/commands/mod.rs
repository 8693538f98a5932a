//! CLI command handlers.

pub mod auth;
pub mod booking;
pub mod bookings;
pub mod business;
pub mod config;
pub mod dashboard;
pub mod providers;
pub mod session;

use std::sync::Arc;

use anyhow::Result;
use handy_core::workflow::{FormWorkflow, Navigator, ScheduledNavigation};

use super::{App, Reported};

/// Prints the route a browser would open next.
struct Terminal;

impl Navigator for Terminal {
    fn navigate(&self, target: &str) {
        println!("→ {target}");
    }
}

/// Follows a scheduled redirect, waiting out its delay unless `no_wait`.
pub(super) async fn follow(nav: ScheduledNavigation, no_wait: bool) {
    if no_wait {
        if let Some(target) = nav.fire_now() {
            Terminal.navigate(&target);
        }
        return;
    }

    if let Err(err) = nav.spawn(Arc::new(Terminal)).await {
        tracing::warn!("navigation task failed: {err}");
    }
}

/// Submits a mounted form and reports the result the way the page would.
///
/// The workflow stays alive until its redirect has fired, since dropping
/// it cancels the redirect.
pub(super) async fn run_form(app: &App, mut workflow: FormWorkflow) -> Result<()> {
    let state = workflow.submit().await;
    if let Some(warning) = &state.warning {
        eprintln!("Warning: {warning}");
    }

    let outcome = match &state.error_message {
        Some(message) => {
            eprintln!("{message}");
            Err(Reported.into())
        }
        None => {
            if let Some(message) = &state.success_message {
                println!("✓ {message}");
            }
            Ok(())
        }
    };

    if let Some(nav) = workflow.take_navigation() {
        follow(nav, app.no_wait).await;
    }
    drop(workflow);
    outcome
}
