//! Form submission workflow.
//!
//! One [`FormWorkflow`] per mounted page. It owns the page's [`FormState`],
//! runs the page's validation rules, sends at most one request at a time
//! through the [`RequestClient`], and turns the result into UI state plus
//! session writes and scheduled navigations.
//!
//! ```text
//! idle --submit(valid)--> submitting --ok--> success
//! idle --submit(invalid)--> error
//! submitting --validation|server|network--> error --edit--> idle
//! submitting --auth--> error (+ redirect to sign-in)
//! ```

pub mod navigation;
pub mod page;
pub mod rules;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use navigation::{Navigation, Navigator, ScheduledNavigation};
pub use page::{Attachments, PageSpec, Persist, Source};
pub use rules::{Rule, validate};

use crate::blob::Blob;
use crate::client::{ApiRequest, Outcome, RequestClient, SubmissionResult};
use crate::session::SessionStore;

/// UI status of a form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormStatus {
    #[default]
    Idle,
    Submitting,
    Success,
    Error,
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormStatus::Idle => write!(f, "idle"),
            FormStatus::Submitting => write!(f, "submitting"),
            FormStatus::Success => write!(f, "success"),
            FormStatus::Error => write!(f, "error"),
        }
    }
}

/// Value of one named form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File(Blob),
}

/// Everything a page renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub fields: BTreeMap<String, FieldValue>,
    pub attachments: Vec<Blob>,
    pub status: FormStatus,
    pub error_message: Option<String>,
    /// Non-blocking notice (refused attachment, wrong file type)
    pub warning: Option<String>,
    pub success_message: Option<String>,
}

impl FormState {
    /// Text value of a field; empty when missing or holding a file.
    pub fn text(&self, name: &str) -> &str {
        match self.fields.get(name) {
            Some(FieldValue::Text(value)) => value,
            _ => "",
        }
    }

    pub fn file(&self, name: &str) -> Option<&Blob> {
        match self.fields.get(name) {
            Some(FieldValue::File(blob)) => Some(blob),
            _ => None,
        }
    }

    pub fn set_text(&mut self, name: &str, value: impl Into<String>) {
        self.fields
            .insert(name.to_string(), FieldValue::Text(value.into()));
    }
}

/// What [`FormWorkflow::begin_submit`] decided.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitStep {
    /// A request is already in flight; nothing changed.
    Busy,
    /// Client-side validation failed; no request should be sent.
    Invalid(String),
    /// Send this request, then hand the result to [`FormWorkflow::complete`].
    Ready(ApiRequest),
}

pub struct FormWorkflow {
    page: PageSpec,
    state: FormState,
    client: RequestClient,
    active: CancellationToken,
    scheduled: Option<ScheduledNavigation>,
}

impl FormWorkflow {
    /// Mounts a page: fresh state, text fields prefilled from the session.
    pub fn new(page: PageSpec, client: RequestClient) -> Self {
        let mut state = FormState::default();
        for (field, key) in &page.prefill {
            if let Some(value) = client.session().get(*key) {
                state.set_text(field, value);
            }
        }

        Self {
            page,
            state,
            client,
            active: CancellationToken::new(),
            scheduled: None,
        }
    }

    pub fn page(&self) -> &PageSpec {
        &self.page
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    fn session(&self) -> &Arc<dyn SessionStore> {
        self.client.session()
    }

    fn transition(&mut self, to: FormStatus) {
        let from = self.state.status;
        if from != to {
            tracing::info!(page = self.page.name, %from, %to, "form status changed");
        }
        self.state.status = to;
    }

    /// An edit after an error returns the form to idle.
    fn note_edit(&mut self) {
        if self.state.status == FormStatus::Error {
            self.state.error_message = None;
            self.transition(FormStatus::Idle);
        }
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        self.state.set_text(name, value);
        self.note_edit();
    }

    /// Checks type and size for image-only uploads. Returns the warning to
    /// show when the blob is refused.
    fn check_upload(&self, field: &str, blob: &Blob) -> Option<String> {
        if !self.page.is_image_field(field) {
            return None;
        }
        if !blob.is_image() {
            return Some(format!("{} is not an image file", blob.file_name));
        }
        if blob.len() > self.page.max_upload_bytes {
            return Some(format!(
                "{} is too large (max {})",
                blob.file_name,
                format_size(self.page.max_upload_bytes)
            ));
        }
        None
    }

    /// Sets a single-file field. Returns `false` (with a warning) when the
    /// blob is refused; the previous value is kept.
    pub fn set_file(&mut self, name: &str, blob: Blob) -> bool {
        if let Some(warning) = self.check_upload(name, &blob) {
            self.state.warning = Some(warning);
            return false;
        }
        self.state.warning = None;
        self.state
            .fields
            .insert(name.to_string(), FieldValue::File(blob));
        self.note_edit();
        true
    }

    /// Appends an attachment. Refused (state unchanged, warning set) when
    /// the page takes no attachments or the list is full.
    pub fn add_attachment(&mut self, blob: Blob) -> bool {
        let Some(attachments) = self.page.attachments else {
            self.state.warning = Some("This form does not accept attachments".to_string());
            return false;
        };
        if self.state.attachments.len() >= attachments.max {
            self.state.warning = Some(format!(
                "You can attach at most {} files",
                attachments.max
            ));
            return false;
        }
        if let Some(warning) = self.check_upload(attachments.field, &blob) {
            self.state.warning = Some(warning);
            return false;
        }

        self.state.warning = None;
        self.state.attachments.push(blob);
        self.note_edit();
        true
    }

    /// Removes the attachment at `index`, if in range.
    pub fn remove_attachment(&mut self, index: usize) -> Option<Blob> {
        if index >= self.state.attachments.len() {
            return None;
        }
        self.state.warning = None;
        let removed = self.state.attachments.remove(index);
        self.note_edit();
        Some(removed)
    }

    /// Runs the page's rules against the current state.
    pub fn validate(&self) -> Option<String> {
        validate(&self.page.rules, &self.state)
    }

    /// First half of a submission: guard, validate, enter `submitting`.
    pub fn begin_submit(&mut self) -> SubmitStep {
        if self.state.status == FormStatus::Submitting {
            tracing::debug!(page = self.page.name, "submit ignored while submitting");
            return SubmitStep::Busy;
        }

        if let Some(message) = self.validate() {
            self.state.error_message = Some(message.clone());
            self.state.success_message = None;
            self.transition(FormStatus::Error);
            return SubmitStep::Invalid(message);
        }

        self.state.error_message = None;
        self.state.success_message = None;
        self.transition(FormStatus::Submitting);
        SubmitStep::Ready((self.page.build_request)(&self.state))
    }

    /// Second half of a submission. Ignored unless a submission is pending.
    pub fn complete(&mut self, result: SubmissionResult) {
        if self.state.status != FormStatus::Submitting {
            tracing::debug!(page = self.page.name, "stray submission result ignored");
            return;
        }

        match result.outcome {
            Outcome::Ok => self.complete_ok(&result),
            Outcome::AuthError => {
                let message = self
                    .page
                    .auth_error_message
                    .map(str::to_string)
                    .or(result.message);
                self.fail(message);
                if let Some(nav) = self.page.on_auth_error.clone() {
                    self.schedule(nav);
                }
            }
            Outcome::ValidationError | Outcome::ServerError | Outcome::NetworkError => {
                self.fail(result.message);
            }
        }
    }

    fn fail(&mut self, message: Option<String>) {
        self.state.error_message =
            Some(message.unwrap_or_else(|| "Something went wrong. Please try again".to_string()));
        self.transition(FormStatus::Error);
    }

    fn complete_ok(&mut self, result: &SubmissionResult) {
        if let Err(err) = self.apply_session_writes(result) {
            self.fail(Some(format!("Could not save your session: {err:#}")));
            return;
        }

        for field in &self.page.transient_fields {
            self.state.fields.remove(*field);
        }
        self.state.attachments.clear();
        self.state.warning = None;
        self.state.success_message = Some(self.page.success_message.to_string());
        self.transition(FormStatus::Success);

        if let Some(nav) = self.page.on_success.clone() {
            self.schedule(nav);
        }
    }

    fn apply_session_writes(&self, result: &SubmissionResult) -> anyhow::Result<()> {
        let session = self.session();
        for persist in &self.page.persist {
            let value = match persist.source {
                Source::Payload(field) => result.payload_str(field),
                Source::Field(field) => {
                    Some(self.state.text(field).trim().to_string()).filter(|v| !v.is_empty())
                }
            };
            match value {
                Some(value) => session.set(persist.key, &value)?,
                None => tracing::debug!(
                    page = self.page.name,
                    slot = %persist.key,
                    "no value to store"
                ),
            }
        }
        for key in &self.page.clear_slots {
            session.clear(*key)?;
        }
        Ok(())
    }

    fn schedule(&mut self, nav: Navigation) {
        if let Some(previous) = self.scheduled.take() {
            previous.cancel();
        }
        tracing::debug!(page = self.page.name, to = %nav.target, delay = ?nav.delay, "navigation scheduled");
        self.scheduled = Some(ScheduledNavigation::new(nav, self.active.child_token()));
    }

    /// Validates, sends and reconciles in one step.
    pub async fn submit(&mut self) -> &FormState {
        if let SubmitStep::Ready(request) = self.begin_submit() {
            let result = self.client.send(request).await;
            self.complete(result);
        }
        &self.state
    }

    pub fn pending_navigation(&self) -> Option<&ScheduledNavigation> {
        self.scheduled.as_ref()
    }

    pub fn take_navigation(&mut self) -> Option<ScheduledNavigation> {
        self.scheduled.take()
    }

    /// Leaves the page. Pending navigations become no-ops.
    pub fn unmount(&self) {
        self.active.cancel();
    }

    pub fn is_mounted(&self) -> bool {
        !self.active.is_cancelled()
    }
}

impl Drop for FormWorkflow {
    fn drop(&mut self) {
        self.active.cancel();
    }
}

fn format_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::blob::testing::png;
    use crate::client::RequestBody;
    use crate::session::{MemorySessionStore, SessionKey};

    fn echo_request(state: &FormState) -> ApiRequest {
        ApiRequest::post("/api/things").json(json!({ "name": state.text("name") }))
    }

    fn page() -> PageSpec {
        let mut page = PageSpec::new("things", echo_request);
        page.rules = vec![Rule::Required {
            fields: &["name"],
            message: "Name is required",
        }];
        page.prefill = vec![("owner", SessionKey::UserId)];
        page.transient_fields = vec!["name"];
        page.attachments = Some(Attachments {
            field: "images",
            max: 3,
        });
        page.image_fields = vec!["images", "photo"];
        page.max_upload_bytes = 64;
        page.persist = vec![Persist::payload(SessionKey::AccessToken, "access_token")];
        page.clear_slots = vec![SessionKey::Cookie];
        page.success_message = "Thing saved";
        page.on_success = Some(Navigation::new("/things", Duration::from_secs(3)));
        page.on_auth_error = Some(Navigation::new("/login", Duration::from_secs(2)));
        page
    }

    fn workflow_with(server_uri: &str, store: Arc<MemorySessionStore>) -> FormWorkflow {
        let client = RequestClient::new(server_uri, store).unwrap();
        FormWorkflow::new(page(), client)
    }

    fn offline() -> FormWorkflow {
        workflow_with("http://127.0.0.1:9", Arc::new(MemorySessionStore::new()))
    }

    #[test]
    fn test_prefill_from_session() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(SessionKey::UserId, "u-7").unwrap();
        let wf = workflow_with("http://127.0.0.1:9", store);
        assert_eq!(wf.state().text("owner"), "u-7");
        assert_eq!(wf.state().status, FormStatus::Idle);
    }

    #[test]
    fn test_invalid_submit_sets_error_without_request() {
        let mut wf = offline();
        assert_eq!(
            wf.begin_submit(),
            SubmitStep::Invalid("Name is required".to_string())
        );
        assert_eq!(wf.state().status, FormStatus::Error);
        assert_eq!(wf.state().error_message.as_deref(), Some("Name is required"));

        wf.set_field("name", "x");
        assert_eq!(wf.state().status, FormStatus::Idle);
        assert_eq!(wf.state().error_message, None);
    }

    #[test]
    fn test_second_submit_while_pending_is_noop() {
        let mut wf = offline();
        wf.set_field("name", "x");
        assert!(matches!(wf.begin_submit(), SubmitStep::Ready(_)));
        let before = wf.state().clone();

        assert_eq!(wf.begin_submit(), SubmitStep::Busy);
        assert_eq!(wf.state(), &before);
    }

    #[test]
    fn test_ready_request_uses_page_builder() {
        let mut wf = offline();
        wf.set_field("name", "widget");
        let SubmitStep::Ready(request) = wf.begin_submit() else {
            panic!("expected a request");
        };
        assert_eq!(request.path, "/api/things");
        assert_eq!(request.body, RequestBody::Json(json!({"name": "widget"})));
    }

    #[test]
    fn test_attachment_limit() {
        let mut wf = offline();
        for i in 0..3 {
            assert!(wf.add_attachment(png(&format!("{i}.png"))));
        }
        let before = wf.state().attachments.clone();

        assert!(!wf.add_attachment(png("4.png")));
        assert_eq!(wf.state().attachments, before);
        assert!(wf.state().warning.is_some());

        assert!(wf.remove_attachment(1).is_some());
        assert_eq!(wf.state().attachments.len(), 2);
        assert_eq!(wf.state().attachments[1].file_name, "2.png");
        assert!(wf.remove_attachment(5).is_none());
    }

    #[test]
    fn test_removing_attachment_after_error_returns_to_idle() {
        let mut wf = offline();
        assert!(wf.add_attachment(png("a.png")));
        assert!(matches!(wf.begin_submit(), SubmitStep::Invalid(_)));
        assert_eq!(wf.state().status, FormStatus::Error);

        assert!(wf.remove_attachment(0).is_some());
        assert_eq!(wf.state().status, FormStatus::Idle);
        assert_eq!(wf.state().error_message, None);
    }

    #[test]
    fn test_image_fields_reject_non_images_and_large_files() {
        let mut wf = offline();
        assert!(!wf.set_file("photo", Blob::new("notes.txt", b"hello".to_vec())));
        assert!(wf.state().warning.as_deref().unwrap().contains("not an image"));
        assert!(wf.state().file("photo").is_none());

        let mut big = png("big.png");
        big.bytes.resize(128, 0);
        assert!(!wf.set_file("photo", big));
        assert!(wf.state().warning.as_deref().unwrap().contains("too large"));

        assert!(wf.set_file("photo", png("ok.png")));
        assert_eq!(wf.state().warning, None);
        assert!(wf.state().file("photo").is_some());
    }

    #[test]
    fn test_stray_result_ignored() {
        let mut wf = offline();
        wf.complete(SubmissionResult::ok(200, None));
        assert_eq!(wf.state().status, FormStatus::Idle);
        assert!(wf.pending_navigation().is_none());
    }

    #[test]
    fn test_success_persists_clears_and_schedules() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(SessionKey::Cookie, "stale=1").unwrap();
        let shared: Arc<MemorySessionStore> = Arc::clone(&store);
        let client = RequestClient::new("http://127.0.0.1:9", shared).unwrap();
        let mut wf = FormWorkflow::new(page(), client);

        wf.set_field("name", "x");
        wf.add_attachment(png("a.png"));
        assert!(matches!(wf.begin_submit(), SubmitStep::Ready(_)));
        wf.complete(SubmissionResult::ok(
            200,
            Some(json!({"access_token": "fresh-token"})),
        ));

        let state = wf.state();
        assert_eq!(state.status, FormStatus::Success);
        assert_eq!(state.success_message.as_deref(), Some("Thing saved"));
        assert_eq!(state.text("name"), "");
        assert!(state.attachments.is_empty());
        assert_eq!(store.get(SessionKey::AccessToken).as_deref(), Some("fresh-token"));
        assert_eq!(store.get(SessionKey::Cookie), None);

        let nav = wf.pending_navigation().unwrap();
        assert_eq!(nav.target(), "/things");
        assert_eq!(nav.delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_server_error_keeps_fields() {
        let mut wf = offline();
        wf.set_field("name", "x");
        wf.begin_submit();
        wf.complete(crate::client::classify(500, br#"{"detail":"boom"}"#));

        assert_eq!(wf.state().status, FormStatus::Error);
        assert_eq!(wf.state().error_message.as_deref(), Some("boom"));
        assert_eq!(wf.state().text("name"), "x");
        assert!(wf.pending_navigation().is_none());
    }

    #[tokio::test]
    async fn test_auth_error_redirects_unless_unmounted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/things"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let mut wf = workflow_with(&server.uri(), Arc::new(MemorySessionStore::new()));
        wf.set_field("name", "x");
        let state = wf.submit().await;
        assert_eq!(state.status, FormStatus::Error);
        assert_eq!(state.error_message.as_deref(), Some("Please sign in to continue"));
        let nav = wf.take_navigation().unwrap();
        assert_eq!(nav.delay(), Duration::from_secs(2));
        assert_eq!(nav.fire_now().as_deref(), Some("/login"));

        let mut wf = workflow_with(&server.uri(), Arc::new(MemorySessionStore::new()));
        wf.set_field("name", "x");
        wf.submit().await;
        let nav = wf.take_navigation().unwrap();
        wf.unmount();
        assert_eq!(nav.wait().await, None);
    }

    #[tokio::test]
    async fn test_network_error_is_recoverable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut wf = workflow_with(
            &format!("http://127.0.0.1:{port}"),
            Arc::new(MemorySessionStore::new()),
        );
        wf.set_field("name", "x");
        wf.submit().await;

        assert_eq!(wf.state().status, FormStatus::Error);
        assert!(wf.state().error_message.is_some());
        wf.set_field("name", "y");
        assert_eq!(wf.state().status, FormStatus::Idle);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_size(64), "64 bytes");
    }
}
