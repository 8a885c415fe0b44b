//! Authenticated session against a Moodle portal.
//!
//! [`SessionManager`] logs in once, then lists enrolled courses through the
//! AJAX web service and scrapes course pages into activities. All fetches
//! take `&self`, so an authenticated manager can be shared behind an `Arc`.

mod login;
mod service;

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{CONTENT_TYPE, COOKIE, REFERER};
use reqwest::{Client, RequestBuilder};
use scraper::Html;
use tracing::{debug, info, instrument, warn};
use url::Url;

use moodleget_extract::{ActivityBatch, extract_activities, extract_courses};
use moodleget_shared::{Activity, Course, MoodleGetError, Result, SessionConfig};

pub use service::{COURSES_LIMIT, COURSES_METHOD};

/// Maximum number of redirects followed per request.
const MAX_REDIRECTS: usize = 10;

/// User-Agent string for portal requests.
const USER_AGENT: &str = concat!("MoodleGet/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// State established by a successful login.
#[derive(Clone)]
pub struct Session {
    login_token: String,
    sesskey: String,
    session_cookie: Option<String>,
}

impl Session {
    /// Session key required by the web service endpoint.
    pub fn sesskey(&self) -> &str {
        &self.sesskey
    }

    /// Value of the session cookie, if the portal set one.
    pub fn session_cookie(&self) -> Option<&str> {
        self.session_cookie.as_deref()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("login_token", &self.login_token)
            .field("sesskey", &self.sesskey)
            .field("session_cookie", &self.session_cookie.as_ref().map(|_| "<set>"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Owns the HTTP client, its cookie jar, and the login state.
pub struct SessionManager {
    config: SessionConfig,
    client: Client,
    jar: Arc<Jar>,
    session: Option<Session>,
}

impl SessionManager {
    /// Build the HTTP client. No request is made until [`authenticate`](Self::authenticate).
    pub fn new(config: SessionConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_provider(Arc::clone(&jar))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout)
            .build()
            .map_err(|e| MoodleGetError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            jar,
            session: None,
        })
    }

    /// The current session, if logged in.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Log in with the configured credentials.
    ///
    /// Fetches the login form for its `logintoken`, posts the credentials, and
    /// reads the `sesskey` from the page the portal lands on. A missing
    /// `sesskey` means the credentials were rejected.
    #[instrument(skip(self), fields(base_url = %self.config.base_url, username = %self.config.credentials.username))]
    pub async fn authenticate(&mut self) -> Result<&Session> {
        self.session = None;
        let login_url = self.config.login_url();

        let login_page = self.send_text(self.client.get(&login_url), &login_url).await?;
        let login_token = login::login_token(&login_page).unwrap_or_else(|| {
            warn!("login form has no logintoken field, posting without one");
            String::new()
        });

        let form = [
            ("username", self.config.credentials.username.as_str()),
            ("password", self.config.credentials.password.as_str()),
            ("logintoken", login_token.as_str()),
        ];
        let request = self
            .client
            .post(&login_url)
            .header(REFERER, &login_url)
            .form(&form);
        let landing_page = self.send_text(request, &login_url).await?;

        let Some(sesskey) = login::session_key(&landing_page) else {
            warn!("portal re-rendered the login form");
            return Err(MoodleGetError::InvalidCredentials);
        };

        let session_cookie = self.session_cookie_value();
        if session_cookie.is_none() {
            warn!(cookie = %self.config.session_cookie, "no session cookie after login");
        }

        info!("logged in");
        Ok(self.session.insert(Session {
            login_token,
            sesskey,
            session_cookie,
        }))
    }

    /// List the user's enrolled courses, in the order the backend returns them.
    #[instrument(skip(self))]
    pub async fn fetch_courses(&self) -> Result<Vec<Course>> {
        let session = self.require_session()?;
        let service_url = self.config.service_url();

        let mut request = self
            .client
            .post(&service_url)
            .query(&[("sesskey", session.sesskey()), ("info", COURSES_METHOD)])
            .header(REFERER, self.config.dashboard_url())
            .header(CONTENT_TYPE, "application/json")
            .body(service::courses_payload().to_string());

        // The service rejects calls without the session cookie, so it is
        // always part of the header alongside the jar's cookies.
        if let Some(cookie) = self.service_cookie_header(&service_url, session) {
            request = request.header(COOKIE, cookie);
        }

        let body = self.send_text(request, &service_url).await?;
        let envelope: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| MoodleGetError::Backend(format!("response is not JSON: {e}")))?;

        let courses = extract_courses(&envelope)?;
        info!(count = courses.len(), "fetched courses");
        Ok(courses)
    }

    /// Scrape a course page into its activities.
    pub async fn fetch_activities(&self, course: &Course) -> Result<Vec<Activity>> {
        Ok(self.fetch_activity_batch(course).await?.activities)
    }

    /// Like [`fetch_activities`](Self::fetch_activities), also reporting the
    /// activities whose content could not be rendered.
    #[instrument(skip_all, fields(course_id = %course.id, url = %course.weblink))]
    pub async fn fetch_activity_batch(&self, course: &Course) -> Result<ActivityBatch> {
        self.require_session()?;

        let request = self
            .client
            .get(&course.weblink)
            .header(REFERER, self.config.dashboard_url());
        let page = self.send_text(request, &course.weblink).await?;

        let batch = parse_course_page(&page, &course.weblink);
        if batch.error_count() > 0 {
            warn!(errors = batch.error_count(), "some activities were degraded");
        }
        info!(count = batch.activities.len(), "fetched activities");
        Ok(batch)
    }

    /// Drop the session, the client and its cookie jar.
    pub fn close(self) {
        info!(authenticated = self.session.is_some(), "closing session");
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn require_session(&self) -> Result<&Session> {
        self.session().ok_or(MoodleGetError::NotAuthenticated)
    }

    /// Send a request and return the body of a successful response.
    async fn send_text(&self, request: RequestBuilder, url: &str) -> Result<String> {
        let response = request
            .send()
            .await
            .map_err(|e| MoodleGetError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MoodleGetError::Network(format!("{url}: HTTP {status}")));
        }

        debug!(final_url = %response.url(), %status, "response received");

        response
            .text()
            .await
            .map_err(|e| MoodleGetError::Network(format!("{url}: failed to read body: {e}")))
    }

    /// Read the session cookie the jar holds for the login URL.
    fn session_cookie_value(&self) -> Option<String> {
        let header = self.jar_cookies(&self.config.login_url())?;
        cookie_pairs(&header)
            .find(|(name, _)| *name == self.config.session_cookie)
            .map(|(_, value)| value.to_string())
    }

    /// `Cookie` header for a service call: the jar's cookies for `url`, with
    /// the session cookie appended when the jar did not supply it.
    fn service_cookie_header(&self, url: &str, session: &Session) -> Option<String> {
        merge_session_cookie(
            self.jar_cookies(url).as_deref(),
            &self.config.session_cookie,
            session.session_cookie(),
        )
    }

    fn jar_cookies(&self, url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let header = self.jar.cookies(&url)?;
        header.to_str().ok().map(String::from)
    }
}

/// `name=value` pairs of a `Cookie` header.
fn cookie_pairs(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
}

fn merge_session_cookie(jar: Option<&str>, name: &str, value: Option<&str>) -> Option<String> {
    let jar = jar.filter(|h| !h.trim().is_empty());
    let missing = value.filter(|_| !jar.is_some_and(|h| cookie_pairs(h).any(|(n, _)| n == name)));

    match (jar, missing) {
        (Some(jar), Some(value)) => Some(format!("{jar}; {name}={value}")),
        (Some(jar), None) => Some(jar.to_string()),
        (None, Some(value)) => Some(format!("{name}={value}")),
        (None, None) => None,
    }
}

/// Parse a course page. Kept out of the async fns because `Html` is not `Send`.
fn parse_course_page(page: &str, url: &str) -> ActivityBatch {
    let doc = Html::parse_document(page);
    extract_activities(&doc, Some(url))
}
