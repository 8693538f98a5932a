//! Per-page declarations consumed by [`FormWorkflow`](super::FormWorkflow).

use crate::client::ApiRequest;
use crate::session::SessionKey;

use super::FormState;
use super::navigation::Navigation;
use super::rules::Rule;

/// Where a value written to the session on success comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Field of the JSON response payload
    Payload(&'static str),
    /// Text field of the submitted form
    Field(&'static str),
}

/// Session write performed after a successful submission.
///
/// Writes whose source holds no value are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persist {
    pub key: SessionKey,
    pub source: Source,
}

impl Persist {
    pub const fn payload(key: SessionKey, field: &'static str) -> Self {
        Self {
            key,
            source: Source::Payload(field),
        }
    }

    pub const fn field(key: SessionKey, field: &'static str) -> Self {
        Self {
            key,
            source: Source::Field(field),
        }
    }
}

/// Ordered, bounded attachment list (e.g. booking photos).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachments {
    /// Multipart field name, repeated once per blob
    pub field: &'static str,
    pub max: usize,
}

/// Everything that distinguishes one form page from another.
#[derive(Debug, Clone)]
pub struct PageSpec {
    pub name: &'static str,
    pub rules: Vec<Rule>,
    /// Text fields seeded from session slots on mount
    pub prefill: Vec<(&'static str, SessionKey)>,
    /// Fields cleared after a successful submission
    pub transient_fields: Vec<&'static str>,
    pub attachments: Option<Attachments>,
    /// File fields (and attachments) that only accept images
    pub image_fields: Vec<&'static str>,
    pub max_upload_bytes: u64,
    pub build_request: fn(&FormState) -> ApiRequest,
    pub persist: Vec<Persist>,
    /// Slots removed after a successful submission
    pub clear_slots: Vec<SessionKey>,
    pub success_message: &'static str,
    /// Replaces the server's message on an auth error
    pub auth_error_message: Option<&'static str>,
    pub on_success: Option<Navigation>,
    pub on_auth_error: Option<Navigation>,
}

impl PageSpec {
    /// A page with no rules, no side effects and no redirects.
    pub fn new(name: &'static str, build_request: fn(&FormState) -> ApiRequest) -> Self {
        Self {
            name,
            rules: Vec::new(),
            prefill: Vec::new(),
            transient_fields: Vec::new(),
            attachments: None,
            image_fields: Vec::new(),
            max_upload_bytes: u64::MAX,
            build_request,
            persist: Vec::new(),
            clear_slots: Vec::new(),
            success_message: "Saved",
            auth_error_message: None,
            on_success: None,
            on_auth_error: None,
        }
    }

    pub fn is_image_field(&self, field: &str) -> bool {
        self.image_fields.contains(&field)
    }
}
