//! What the watch loop does with a classified remote error.

use bagwatch_fetch::{ApiError, ErrorKind};
use bagwatch_market::endpoints::TOKEN_REFRESH;

/// Static diagnosis reference shown by `bagwatch errors`.
pub const COMMON_ERRORS: &str = "⚠️ Common errors and possible diagnosis:\n\
- 403: The IP is temporarily banned, or a challenge must be solved. Open the link, then supply the cookie with `bagwatch cookie`.\n\
- 401: You've been kicked, try refreshing your tokens with `bagwatch refresh` or log back in with `bagwatch login`.\n\
- 400: The request was rejected as malformed; the endpoint is included in the message.\n\
- Other codes and timeouts: the service is unreachable, polling continues on the next tick.";

/// Pointer appended to every error message.
const ERRORS_HINT: &str = "Run `bagwatch errors` for more info.";

/// Reaction to one error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyAction {
    /// Text to send to the user.
    pub message: String,
    /// Refresh the session before the next tick.
    pub refresh: bool,
    /// Suspend polling until a new challenge cookie is supplied.
    pub hold_challenge: Option<String>,
}

/// Maps classified errors to [`PolicyAction`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorPolicy;

impl ErrorPolicy {
    /// Decides how to react to `error`.
    pub fn evaluate(&self, error: &ApiError) -> PolicyAction {
        let refresh_allowed = error.endpoint != TOKEN_REFRESH;
        match error.kind {
            ErrorKind::Forbidden => {
                let message = match &error.challenge_url {
                    Some(url) => format!(
                        "{error}\n🧩 A challenge must be solved: {url}\nOpen it in a browser, then supply the cookie with `bagwatch cookie`. Polling is paused until then.\n{ERRORS_HINT}"
                    ),
                    None => error_text(error),
                };
                PolicyAction {
                    message,
                    refresh: refresh_allowed,
                    hold_challenge: error.challenge_url.clone(),
                }
            }
            ErrorKind::LoggedOut => PolicyAction {
                message: format!("{error}\nLog in with `bagwatch login`.\n{ERRORS_HINT}"),
                refresh: false,
                hold_challenge: None,
            },
            // A 401 reaching the loop already failed its single retry.
            ErrorKind::Unauthorized
            | ErrorKind::BadRequest
            | ErrorKind::Transport
            | ErrorKind::Connection
            | ErrorKind::InvalidResponse
            | ErrorKind::LoginFailed => PolicyAction {
                message: error_text(error),
                refresh: false,
                hold_challenge: None,
            },
        }
    }
}

/// User-facing text for an error.
pub fn error_text(error: &ApiError) -> String {
    format!("{error}\n{ERRORS_HINT}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_with_challenge_holds_and_refreshes() {
        let error = ApiError::from_status(
            403,
            "item/v7/",
            Some("https://geo.captcha.example/c".into()),
        );
        let action = ErrorPolicy.evaluate(&error);
        assert!(action.refresh);
        assert_eq!(
            action.hold_challenge.as_deref(),
            Some("https://geo.captcha.example/c")
        );
        assert!(action.message.contains("https://geo.captcha.example/c"));
        assert!(action.message.contains("bagwatch errors"));
    }

    #[test]
    fn test_forbidden_on_refresh_does_not_refresh() {
        let error = ApiError::from_status(403, TOKEN_REFRESH, None);
        let action = ErrorPolicy.evaluate(&error);
        assert!(!action.refresh);
        assert!(action.hold_challenge.is_none());
    }

    #[test]
    fn test_bad_request_surfaces_endpoint() {
        let error = ApiError::from_status(400, "item/v7/", None);
        let action = ErrorPolicy.evaluate(&error);
        assert!(action.message.contains("item/v7/"));
        assert!(!action.refresh);
    }

    #[test]
    fn test_unauthorized_is_only_surfaced() {
        let action = ErrorPolicy.evaluate(&ApiError::from_status(401, "item/v7/", None));
        assert!(!action.refresh);
        assert!(action.message.starts_with("UnauthorizedError"));
    }
}
