//! Login form parsing.
//!
//! The login page carries a one-time `logintoken` that must be posted back
//! with the credentials. After a successful login every page renders a logout
//! form holding the `sesskey`; a rejected login re-renders the login form,
//! which has none.

use scraper::Html;

use moodleget_extract::query::input_value;

/// Anti-forgery token of the login form.
pub(crate) fn login_token(page: &str) -> Option<String> {
    let doc = Html::parse_document(page);
    input_value(&doc, "logintoken").filter(|token| !token.is_empty())
}

/// Session key of a logged-in page, `None` if the page is the login form.
pub(crate) fn session_key(page: &str) -> Option<String> {
    let doc = Html::parse_document(page);
    input_value(&doc, "sesskey").filter(|key| !key.is_empty())
}
