//! Typed read endpoints of the marketplace API and the provider dashboard.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use crate::categories::slugify;
use crate::client::{ApiRequest, AuthMode, Outcome, RequestClient, path_segment};
use crate::config::Config;
use crate::pages::routes;
use crate::session::SessionKey;
use crate::workflow::Navigation;

/// Accepts `"12"`, `12` or `12.5`; anything else becomes `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Review {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, alias = "customerName")]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Booking {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

impl Booking {
    /// Accepted bookings count as confirmed.
    pub fn is_confirmed(&self) -> bool {
        matches!(self.status.as_deref(), Some("accepted" | "confirmed"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Provider {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hourly_rate: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub working_hours: Option<String>,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl Provider {
    pub fn display_name(&self) -> &str {
        self.business_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("Unnamed provider")
    }

    pub fn in_category(&self, slug: &str) -> bool {
        self.service_type
            .as_deref()
            .is_some_and(|service| !service.is_empty() && slugify(service) == slug)
    }
}

/// Keeps providers whose `service_type` slug equals `slug`.
pub fn providers_in_category(providers: Vec<Provider>, slug: &str) -> Vec<Provider> {
    providers
        .into_iter()
        .filter(|provider| provider.in_category(slug))
        .collect()
}

/// Booking lifecycle states understood by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            _ => Err(format!(
                "Unknown booking status: {value} (expected pending, accepted, rejected or completed)"
            )),
        }
    }
}

/// Provider plus the numbers shown on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub provider: Provider,
    pub total_bookings: usize,
    pub confirmed_bookings: usize,
    /// `None` until the provider has reviews
    pub average_rating: Option<f64>,
}

impl Dashboard {
    pub fn from_provider(provider: Provider) -> Self {
        let total_bookings = provider.bookings.len();
        let confirmed_bookings = provider.bookings.iter().filter(|b| b.is_confirmed()).count();
        let average_rating = (!provider.reviews.is_empty()).then(|| {
            let sum: f64 = provider.reviews.iter().map(|r| r.rating).sum();
            let count = provider.reviews.len() as f64;
            sum / count
        });
        Self {
            provider,
            total_bookings,
            confirmed_bookings,
            average_rating,
        }
    }
}

/// Outcome of opening the provider dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    Ready(Box<Dashboard>),
    /// The session is missing or expired; go sign in.
    SignInRequired(Navigation),
}

/// Read-side API calls.
#[derive(Clone)]
pub struct Marketplace {
    client: RequestClient,
    auth_redirect_delay: Duration,
}

impl Marketplace {
    pub fn new(client: RequestClient, config: &Config) -> Self {
        Self {
            client,
            auth_redirect_delay: config.redirects.auth_redirect_delay(),
        }
    }

    pub fn client(&self) -> &RequestClient {
        &self.client
    }

    /// `GET /api/providers`
    ///
    /// # Errors
    /// Returns an error for any non-ok outcome or an unexpected payload.
    pub async fn list_providers(&self) -> Result<Vec<Provider>> {
        self.client
            .send(ApiRequest::get("/api/providers"))
            .await
            .decode()
            .context("Failed to fetch providers")
    }

    /// Providers offering the category `slug`.
    ///
    /// # Errors
    /// Returns an error if the provider list cannot be fetched.
    pub async fn category_providers(&self, slug: &str) -> Result<Vec<Provider>> {
        let providers = self.list_providers().await?;
        Ok(providers_in_category(providers, slug))
    }

    /// `GET /api/providers/{id}` with bearer auth.
    ///
    /// # Errors
    /// Returns an error for any non-ok outcome or an unexpected payload.
    pub async fn get_provider(&self, id: &str) -> Result<Provider> {
        self.client
            .send(provider_request(id))
            .await
            .decode()
            .with_context(|| format!("Failed to fetch provider {id}"))
    }

    /// `GET /api/me/bookings` with cookie auth.
    ///
    /// # Errors
    /// Returns an error for any non-ok outcome or an unexpected payload.
    pub async fn my_bookings(&self) -> Result<Vec<Booking>> {
        self.client
            .send(ApiRequest::get("/api/me/bookings").auth(AuthMode::Cookie))
            .await
            .decode()
            .context("Failed to fetch bookings")
    }

    /// `PATCH /api/me/bookings/{id}/status?status=...`
    ///
    /// # Errors
    /// Returns an error for any non-ok outcome.
    pub async fn update_booking_status(&self, id: &str, status: BookingStatus) -> Result<()> {
        let request = ApiRequest::patch(format!("/api/me/bookings/{}/status", path_segment(id)))
            .auth(AuthMode::Cookie)
            .query("status", status.as_str());
        self.client
            .send(request)
            .await
            .into_payload()
            .with_context(|| format!("Failed to update booking {id}"))?;
        tracing::info!(booking = id, %status, "booking status updated");
        Ok(())
    }

    /// Loads the signed-in provider's dashboard.
    ///
    /// Without a stored token and provider id no request is made. An auth
    /// error on the provider fetch also means signing in again.
    ///
    /// # Errors
    /// Returns an error for non-auth failures or an unexpected payload.
    pub async fn load_dashboard(&self) -> Result<DashboardView> {
        let session = self.client.session();
        let token = session.get(SessionKey::AccessToken);
        let provider_id = session.get(SessionKey::ProviderId);
        let (Some(_), Some(provider_id)) = (token, provider_id) else {
            tracing::info!("no provider session; sign-in required");
            return Ok(self.sign_in_required());
        };

        let result = self.client.send(provider_request(&provider_id)).await;
        if result.outcome == Outcome::AuthError {
            tracing::info!(provider = %provider_id, "provider session expired");
            return Ok(self.sign_in_required());
        }

        let provider: Provider = result.decode().context("Failed to load dashboard")?;
        Ok(DashboardView::Ready(Box::new(Dashboard::from_provider(
            provider,
        ))))
    }

    fn sign_in_required(&self) -> DashboardView {
        DashboardView::SignInRequired(Navigation::new(
            routes::PROVIDER_SIGNIN,
            self.auth_redirect_delay,
        ))
    }
}

fn provider_request(id: &str) -> ApiRequest {
    ApiRequest::get(format!("/api/providers/{}", path_segment(id))).auth(AuthMode::Bearer)
}
