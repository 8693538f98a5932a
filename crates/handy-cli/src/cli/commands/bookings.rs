//! Booking list and status handlers.

use anyhow::Result;
use handy_core::api::{BookingStatus, Marketplace};

use crate::cli::App;

pub async fn list(app: &App) -> Result<()> {
    let market = Marketplace::new(app.client.clone(), &app.config);
    let bookings = market.my_bookings().await?;
    if bookings.is_empty() {
        println!("No bookings found.");
        return Ok(());
    }

    for booking in bookings {
        println!(
            "{}  {} {}  {}  {}  [{}]",
            booking.id.as_deref().unwrap_or("-"),
            booking.date.as_deref().unwrap_or("?"),
            booking.time.as_deref().unwrap_or("?"),
            booking
                .provider_name
                .as_deref()
                .or(booking.provider_id.as_deref())
                .unwrap_or("-"),
            booking.location.as_deref().unwrap_or("-"),
            booking.status.as_deref().unwrap_or("pending"),
        );
    }
    Ok(())
}

pub async fn set_status(app: &App, id: &str, status: &str) -> Result<()> {
    let status = status
        .parse::<BookingStatus>()
        .map_err(anyhow::Error::msg)?;
    let market = Marketplace::new(app.client.clone(), &app.config);
    market.update_booking_status(id, status).await?;
    println!("✓ Booking {id} marked {status}");
    Ok(())
}
