//! Failure classification for rendered pages.
//!
//! A fetch attempt produces either a [`PageSnapshot`] or a transport
//! error; [`classify`] folds both into one of four signals the engine
//! acts on. Pure function, no retained state.

use scraper::{Html, Selector};
use url::Url;

use crate::error::HarvestError;
use crate::record::ProfilePayload;

/// Auth-wall markers checked against the final URL.
const AUTH_WALL_URL_MARKERS: &[&str] = &["authwall", "login", "signin", "checkpoint"];

/// Auth-wall markers checked against the page body, for walls served
/// in place on the profile URL without a redirect.
const AUTH_WALL_BODY_MARKERS: &[&str] = &["sign in to view", "join now to view"];

/// CAPTCHA markers checked against the page body.
const CAPTCHA_MARKERS: &[&str] = &["captcha", "security verification", "are you a robot"];

/// Selector for the profile headline name.
const NAME_SELECTOR: &str = "h1.text-heading-xlarge";

/// Selector for the profile location line.
const LOCATION_SELECTOR: &str = "span.text-body-small";

/// What the page driver handed back for one attempt: the URL the browser
/// ended up on (redirects included), the document title, and the
/// rendered HTML.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub requested_url: String,
    pub final_url: String,
    pub title: String,
    pub html: String,
}

/// Classified result of one fetch attempt. Transient: consumed by the
/// engine immediately, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(ProfilePayload),
    AuthWall,
    Captcha,
    NetworkError(String),
}

impl FetchOutcome {
    /// Auth walls, captchas, and network errors all count toward the
    /// rotation threshold; they differ only in logging.
    pub fn is_blocked(&self) -> bool {
        !matches!(self, FetchOutcome::Success(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::AuthWall => "auth-wall",
            FetchOutcome::Captcha => "captcha",
            FetchOutcome::NetworkError(_) => "network-error",
        }
    }
}

/// Classify a single fetch attempt. Priority order, first match wins:
/// auth wall, captcha, transport failure, success.
pub fn classify(outcome: &Result<PageSnapshot, HarvestError>) -> FetchOutcome {
    let snapshot = match outcome {
        Ok(s) => s,
        Err(e) => return FetchOutcome::NetworkError(e.to_string()),
    };

    let body_lower = snapshot.html.to_lowercase();

    if hit_auth_wall(&snapshot.final_url, &body_lower) {
        return FetchOutcome::AuthWall;
    }

    if CAPTCHA_MARKERS.iter().any(|m| body_lower.contains(m)) {
        return FetchOutcome::Captcha;
    }

    // A proxy splash page or interstitial lands the browser off the
    // target host; the original treats that as a retryable failure.
    if !same_host(&snapshot.requested_url, &snapshot.final_url) {
        return FetchOutcome::NetworkError(format!(
            "redirected off target host to {}",
            snapshot.final_url
        ));
    }

    // Chrome error pages render a title like "... is not available".
    let title_lower = snapshot.title.to_lowercase();
    if title_lower.contains("error") || body_lower.contains("this page isn't working") {
        return FetchOutcome::NetworkError(format!("browser error page: {}", snapshot.title));
    }

    match extract_payload(&snapshot.html) {
        Some(payload) => FetchOutcome::Success(payload),
        None => FetchOutcome::NetworkError("profile content missing".to_string()),
    }
}

/// Substring match on the URL, the way the wall actually shows up:
/// redirect targets vary (`/authwall`, `/uas/login?session_redirect=…`,
/// `/checkpoint/challenge/…`) but always carry one of the markers.
fn hit_auth_wall(final_url: &str, body_lower: &str) -> bool {
    let url_lower = final_url.to_lowercase();
    AUTH_WALL_URL_MARKERS.iter().any(|m| url_lower.contains(m))
        || AUTH_WALL_BODY_MARKERS.iter().any(|m| body_lower.contains(m))
}

fn same_host(requested: &str, landed: &str) -> bool {
    match (Url::parse(requested), Url::parse(landed)) {
        (Ok(a), Ok(b)) => a.host_str() == b.host_str(),
        _ => false,
    }
}

/// Pull the headline name and location out of the rendered profile.
/// Returns `None` when neither element is present, which means the page
/// is not actually a profile (interstitial, partial render).
fn extract_payload(html: &str) -> Option<ProfilePayload> {
    let doc = Html::parse_document(html);
    // Selectors are compile-time constants; parse failures are a bug.
    let name_sel = Selector::parse(NAME_SELECTOR).ok()?;
    let location_sel = Selector::parse(LOCATION_SELECTOR).ok()?;

    let full_name = doc
        .select(&name_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())?;

    let location = doc
        .select(&location_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())?;

    Some(ProfilePayload {
        full_name,
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_HTML: &str = r#"
        <html><head><title>Ada Lovelace | Profile</title></head><body>
            <h1 class="text-heading-xlarge">Ada Lovelace</h1>
            <span class="text-body-small">London, United Kingdom</span>
        </body></html>
    "#;

    fn snapshot(final_url: &str, title: &str, html: &str) -> PageSnapshot {
        PageSnapshot {
            requested_url: "https://www.example.com/in/ada".into(),
            final_url: final_url.into(),
            title: title.into(),
            html: html.into(),
        }
    }

    #[test]
    fn test_success_extracts_payload() {
        let snap = snapshot("https://www.example.com/in/ada", "Ada", PROFILE_HTML);
        let outcome = classify(&Ok(snap));
        assert_eq!(
            outcome,
            FetchOutcome::Success(ProfilePayload {
                full_name: "Ada Lovelace".into(),
                location: "London, United Kingdom".into(),
            })
        );
        assert!(!outcome.is_blocked());
    }

    #[test]
    fn test_authwall_url_classified_first() {
        // Auth wall redirect wins even if the page smells like a captcha.
        let snap = snapshot(
            "https://www.example.com/authwall?trk=x",
            "Sign in",
            "<html><body>captcha</body></html>",
        );
        assert_eq!(classify(&Ok(snap)), FetchOutcome::AuthWall);
    }

    #[test]
    fn test_login_redirect_is_auth_wall() {
        let snap = snapshot("https://www.example.com/login", "Sign in", "<html></html>");
        assert_eq!(classify(&Ok(snap)), FetchOutcome::AuthWall);
    }

    #[test]
    fn test_nested_login_path_is_auth_wall() {
        let snap = snapshot(
            "https://www.example.com/uas/login?session_redirect=%2Fin%2Fada",
            "Sign in",
            "<html></html>",
        );
        assert_eq!(classify(&Ok(snap)), FetchOutcome::AuthWall);
    }

    #[test]
    fn test_sign_in_wall_markup_without_redirect_is_auth_wall() {
        // The wall can render in place on the profile URL itself.
        let snap = snapshot(
            "https://www.example.com/in/ada",
            "Profile",
            "<html><body><h2>Sign in to view this profile</h2></body></html>",
        );
        assert_eq!(classify(&Ok(snap)), FetchOutcome::AuthWall);
    }

    #[test]
    fn test_captcha_marker_in_body() {
        let snap = snapshot(
            "https://www.example.com/in/ada",
            "Verify",
            "<html><body>Please complete this CAPTCHA to continue</body></html>",
        );
        assert_eq!(classify(&Ok(snap)), FetchOutcome::Captcha);
    }

    #[test]
    fn test_transport_error_is_network_error() {
        let outcome = classify(&Err(HarvestError::Timeout(30)));
        assert!(matches!(outcome, FetchOutcome::NetworkError(_)));
        assert!(outcome.is_blocked());
    }

    #[test]
    fn test_off_host_redirect_is_network_error() {
        let snap = PageSnapshot {
            requested_url: "https://www.example.com/in/ada".into(),
            final_url: "http://proxy-gateway.local/blocked".into(),
            title: "Gateway".into(),
            html: "<html><body>upstream unavailable</body></html>".into(),
        };
        assert!(matches!(
            classify(&Ok(snap)),
            FetchOutcome::NetworkError(_)
        ));
    }

    #[test]
    fn test_error_page_title_is_network_error() {
        let snap = snapshot(
            "https://www.example.com/in/ada",
            "Error 502",
            "<html><body></body></html>",
        );
        assert!(matches!(
            classify(&Ok(snap)),
            FetchOutcome::NetworkError(_)
        ));
    }

    #[test]
    fn test_missing_profile_content_is_retryable() {
        let snap = snapshot(
            "https://www.example.com/in/ada",
            "Profile",
            "<html><body><p>loading...</p></body></html>",
        );
        assert_eq!(
            classify(&Ok(snap)),
            FetchOutcome::NetworkError("profile content missing".into())
        );
    }

    #[test]
    fn test_labels_are_distinct_for_logging() {
        assert_eq!(FetchOutcome::AuthWall.label(), "auth-wall");
        assert_eq!(FetchOutcome::Captcha.label(), "captcha");
        assert_ne!(
            FetchOutcome::AuthWall.label(),
            FetchOutcome::Captcha.label()
        );
    }
}
