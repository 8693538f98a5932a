//! Provider dashboard handler.

use anyhow::Result;
use handy_core::api::{DashboardView, Marketplace};
use handy_core::workflow::ScheduledNavigation;
use tokio_util::sync::CancellationToken;

use super::follow;
use crate::cli::{App, Reported};

pub async fn run(app: &App) -> Result<()> {
    let market = Marketplace::new(app.client.clone(), &app.config);
    let dashboard = match market.load_dashboard().await? {
        DashboardView::Ready(dashboard) => dashboard,
        DashboardView::SignInRequired(nav) => {
            eprintln!("Please sign in to view your dashboard.");
            let scheduled = ScheduledNavigation::new(nav, CancellationToken::new());
            follow(scheduled, app.no_wait).await;
            return Err(Reported.into());
        }
    };

    let provider = &dashboard.provider;
    println!("{}", provider.display_name());
    if let Some(service) = &provider.service_type {
        println!("  {service}");
    }
    println!();
    println!("  Total bookings      {}", dashboard.total_bookings);
    println!("  Confirmed bookings  {}", dashboard.confirmed_bookings);
    match dashboard.average_rating {
        Some(rating) => println!(
            "  Average rating      {rating:.1} ({} reviews)",
            provider.reviews.len()
        ),
        None => println!("  Average rating      no reviews yet"),
    }

    if !provider.bookings.is_empty() {
        println!();
        println!("Recent bookings:");
        for booking in &provider.bookings {
            println!(
                "  {} {}  {}  [{}]",
                booking.date.as_deref().unwrap_or("?"),
                booking.time.as_deref().unwrap_or("?"),
                booking.location.as_deref().unwrap_or("-"),
                booking.status.as_deref().unwrap_or("pending"),
            );
        }
    }
    Ok(())
}
