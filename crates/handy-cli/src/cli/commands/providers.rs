//! Category and provider browsing.

use anyhow::Result;
use handy_core::api::{Marketplace, Provider};
use handy_core::categories::{category_title, search_categories};

use crate::cli::App;

pub fn categories(search: Option<&str>) {
    for category in search_categories(search.unwrap_or_default()) {
        println!("{:<14} {}", category.slug, category.name);
    }
}

fn print_row(provider: &Provider) {
    println!(
        "{}  {}  {}  R{}/h",
        provider.id.as_deref().unwrap_or("-"),
        provider.display_name(),
        provider.service_type.as_deref().unwrap_or("-"),
        provider.hourly_rate.as_deref().unwrap_or("?"),
    );
}

pub async fn list(app: &App, category: Option<&str>) -> Result<()> {
    let market = Marketplace::new(app.client.clone(), &app.config);
    let providers = match category {
        Some(slug) => {
            println!("{}", category_title(slug));
            market.category_providers(slug).await?
        }
        None => market.list_providers().await?,
    };

    if providers.is_empty() {
        println!("No providers found.");
    }
    for provider in &providers {
        print_row(provider);
    }
    Ok(())
}

pub async fn show(app: &App, id: &str) -> Result<()> {
    let market = Marketplace::new(app.client.clone(), &app.config);
    let provider = market.get_provider(id).await?;

    println!("{}", provider.display_name());
    let rows = [
        ("Service", provider.service_type.as_deref()),
        ("Rate", provider.hourly_rate.as_deref()),
        ("Location", provider.location.as_deref()),
        ("Hours", provider.working_hours.as_deref()),
        ("Email", provider.email.as_deref()),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            println!("  {label:<9} {value}");
        }
    }
    if let Some(photo) = provider
        .profile_photo
        .as_deref()
        .and_then(|p| app.client.asset_url(p))
    {
        println!("  {:<9} {photo}", "Photo");
    }

    if !provider.reviews.is_empty() {
        println!();
        println!("Reviews:");
        for review in &provider.reviews {
            println!(
                "  {:.1}  {}  {}",
                review.rating,
                review.customer_name.as_deref().unwrap_or("Anonymous"),
                review.comment.as_deref().unwrap_or_default(),
            );
        }
    }
    Ok(())
}
