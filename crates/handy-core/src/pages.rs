//! Page declarations: rules, request shape, session writes and redirects for
//! every form in the marketplace.

use chrono::{NaiveDate, NaiveTime};
use serde_json::json;

use crate::client::{ApiRequest, AuthMode, Part, path_segment};
use crate::config::Config;
use crate::session::SessionKey;
use crate::workflow::{Attachments, FormState, Navigation, PageSpec, Persist, Rule};

/// Navigation targets.
pub mod routes {
    pub const CATEGORIES: &str = "/categories";
    pub const LOGIN: &str = "/login";
    pub const CUSTOMER_SIGNIN: &str = "/signup/customer/signin";
    pub const PROVIDER_BUSINESS: &str = "/signup/provider/business";
    pub const PROVIDER_SIGNIN: &str = "/signup/provider/signin";
    pub const PROVIDER_DASHBOARD: &str = "/provider/dashboard";
}

const SIGNUP_FIELDS: &[&str] = &["full_name", "email", "password"];
const BUSINESS_TEXT_FIELDS: &[&str] = &[
    "business_name",
    "service_type",
    "hourly_rate",
    "location",
    "working_hours",
];
const BUSINESS_FILE_FIELDS: &[&str] = &["sa_front_id", "sa_back_id", "profile_photo"];
const BOOKING_FIELDS: &[&str] = &["date", "time", "location", "description"];

/// Attachment field of the booking form.
pub const BOOKING_IMAGES: &str = "images";
pub const MAX_BOOKING_IMAGES: usize = 3;

fn looks_like_email(value: &str) -> bool {
    value
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && !domain.is_empty())
}

fn is_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn is_time(value: &str) -> bool {
    value.len() == 5 && NaiveTime::parse_from_str(value, "%H:%M").is_ok()
}

fn is_rate(value: &str) -> bool {
    value
        .parse::<f64>()
        .is_ok_and(|rate| rate.is_finite() && rate > 0.0)
}

fn text_parts(state: &FormState, names: &[&str]) -> Vec<(String, Part)> {
    names
        .iter()
        .map(|name| {
            (
                (*name).to_string(),
                Part::Text(state.text(name).trim().to_string()),
            )
        })
        .collect()
}

fn signup_body(state: &FormState) -> serde_json::Value {
    json!({
        "full_name": state.text("full_name").trim(),
        "email": state.text("email").trim(),
        "password": state.text("password"),
    })
}

fn signup_rules() -> Vec<Rule> {
    vec![
        Rule::Required {
            fields: SIGNUP_FIELDS,
            message: "Please fill in your name, email and password",
        },
        Rule::Format {
            field: "email",
            check: looks_like_email,
            message: "Please enter a valid email address",
        },
    ]
}

fn customer_signup_request(state: &FormState) -> ApiRequest {
    ApiRequest::post("/api/users/register").json(signup_body(state))
}

/// Customer registration. Stores the access token when the server returns
/// one, then sends the user to sign in.
pub fn customer_signup(config: &Config) -> PageSpec {
    let mut page = PageSpec::new("customer-signup", customer_signup_request);
    page.rules = signup_rules();
    page.transient_fields = vec!["password"];
    page.persist = vec![
        Persist::payload(SessionKey::AccessToken, "access_token"),
        Persist::payload(SessionKey::UserId, "user_id"),
    ];
    page.success_message = "Account created. Please sign in.";
    page.on_success = Some(Navigation::new(
        routes::CUSTOMER_SIGNIN,
        config.redirects.login_delay(),
    ));
    page
}

fn provider_signup_request(state: &FormState) -> ApiRequest {
    ApiRequest::post("/api/providers/register").json(signup_body(state))
}

/// First step of the provider wizard.
pub fn provider_signup(config: &Config) -> PageSpec {
    let mut page = PageSpec::new("provider-signup", provider_signup_request);
    page.rules = signup_rules();
    page.transient_fields = vec!["password"];
    page.persist = vec![
        Persist::payload(SessionKey::ProviderId, "provider_id"),
        Persist::payload(SessionKey::AccessToken, "access_token"),
    ];
    page.success_message = "Provider account created. Tell us about your business.";
    page.on_success = Some(Navigation::new(
        routes::PROVIDER_BUSINESS,
        config.redirects.login_delay(),
    ));
    page
}

fn provider_login_request(state: &FormState) -> ApiRequest {
    // OAuth2 password form: all six keys are sent even when empty.
    ApiRequest::post("/api/providers/login").form([
        ("grant_type", ""),
        ("username", state.text("username").trim()),
        ("password", state.text("password")),
        ("scope", ""),
        ("client_id", ""),
        ("client_secret", ""),
    ])
}

/// Provider sign-in.
pub fn provider_login(config: &Config) -> PageSpec {
    let mut page = PageSpec::new("provider-signin", provider_login_request);
    page.rules = vec![Rule::Required {
        fields: &["username", "password"],
        message: "Please enter your email and password",
    }];
    page.transient_fields = vec!["password"];
    page.persist = vec![
        Persist::payload(SessionKey::AccessToken, "access_token"),
        Persist::payload(SessionKey::ProviderId, "provider_id"),
    ];
    page.success_message = "Signed in";
    page.auth_error_message = Some("Invalid email or password");
    page.on_success = Some(Navigation::new(
        routes::PROVIDER_DASHBOARD,
        config.redirects.login_delay(),
    ));
    page
}

fn business_details_request(state: &FormState) -> ApiRequest {
    let provider_id = path_segment(state.text("provider_id").trim());
    let mut parts = text_parts(state, BUSINESS_TEXT_FIELDS);
    for field in BUSINESS_FILE_FIELDS {
        if let Some(blob) = state.file(field) {
            parts.push(((*field).to_string(), Part::File(blob.clone())));
        }
    }
    ApiRequest::post(format!("/api/providers/{provider_id}/business-details"))
        .auth(AuthMode::Bearer)
        .multipart(parts)
}

/// Second step of the provider wizard: business profile plus ID scans and
/// a profile photo.
pub fn business_details(config: &Config) -> PageSpec {
    let mut page = PageSpec::new("business-details", business_details_request);
    page.rules = vec![
        Rule::Required {
            fields: &["provider_id"],
            message: "Provider not specified. Please complete provider signup first.",
        },
        Rule::Required {
            fields: BUSINESS_TEXT_FIELDS,
            message: "Please fill in all required fields",
        },
        Rule::Format {
            field: "hourly_rate",
            check: is_rate,
            message: "Hourly rate must be a positive number",
        },
        Rule::RequiredFiles {
            fields: BUSINESS_FILE_FIELDS,
            message: "Please upload all required images",
        },
    ];
    page.prefill = vec![("provider_id", SessionKey::ProviderId)];
    page.transient_fields = BUSINESS_TEXT_FIELDS
        .iter()
        .chain(BUSINESS_FILE_FIELDS)
        .copied()
        .collect();
    page.image_fields = BUSINESS_FILE_FIELDS.to_vec();
    page.max_upload_bytes = config.max_upload_bytes;
    page.success_message = "Registration completed successfully!";
    page.on_success = Some(Navigation::new(
        routes::PROVIDER_DASHBOARD,
        config.redirects.login_delay(),
    ));
    page.on_auth_error = Some(Navigation::new(
        routes::PROVIDER_SIGNIN,
        config.redirects.auth_redirect_delay(),
    ));
    page
}

fn booking_request(state: &FormState) -> ApiRequest {
    let mut parts = text_parts(
        state,
        &["provider_id", "user_id", "date", "time", "location"],
    );
    let description = state.text("description").trim();
    if !description.is_empty() {
        parts.push((
            "description".to_string(),
            Part::Text(description.to_string()),
        ));
    }
    for image in &state.attachments {
        parts.push((BOOKING_IMAGES.to_string(), Part::File(image.clone())));
    }
    ApiRequest::post("/api/me/bookings")
        .auth(AuthMode::Cookie)
        .multipart(parts)
}

/// Booking request for one provider, with up to three photos.
pub fn booking(config: &Config) -> PageSpec {
    let mut page = PageSpec::new("booking", booking_request);
    page.rules = vec![
        Rule::Required {
            fields: &["date", "time", "location"],
            message: "Please fill in all required fields",
        },
        Rule::Required {
            fields: &["provider_id"],
            message: "Provider not specified. Please return to the provider page and try again.",
        },
        Rule::Required {
            fields: &["user_id"],
            message: "User not specified. Please return to the user page and try again.",
        },
        Rule::Format {
            field: "date",
            check: is_date,
            message: "Date must be in YYYY-MM-DD format",
        },
        Rule::Format {
            field: "time",
            check: is_time,
            message: "Time must be in HH:MM format",
        },
    ];
    page.prefill = vec![("user_id", SessionKey::UserId)];
    page.transient_fields = BOOKING_FIELDS.to_vec();
    page.attachments = Some(Attachments {
        field: BOOKING_IMAGES,
        max: MAX_BOOKING_IMAGES,
    });
    page.image_fields = vec![BOOKING_IMAGES];
    page.max_upload_bytes = config.max_upload_bytes;
    page.success_message =
        "Booking Successful! Your request has been sent to the provider, who will contact you soon.";
    page.auth_error_message = Some("Please login to make a booking");
    page.on_success = Some(Navigation::new(
        routes::CATEGORIES,
        config.redirects.booking_success_delay(),
    ));
    page.on_auth_error = Some(Navigation::new(
        routes::LOGIN,
        config.redirects.auth_redirect_delay(),
    ));
    page
}
