use crate::unicode::normalize;
use reqwest::StatusCode;
use serde_json::{Map, Value};

/// Message reported by every stage when its cancellation signal fires.
pub const CANCELLED: &str = "Request cancelled";

/// Prefix of the start-game text when the request never got a reply.
pub const REQUEST_FAILED: &str = "Request failed";

const MESSAGE_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub success: bool,
    pub message: String,
    pub token: Option<String>,
    pub raw: Option<String>,
}

impl LoginResult {
    pub fn cancelled() -> Self {
        Self::failed(CANCELLED)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            token: None,
            raw: None,
        }
    }

    /// The token to chain into later stages, if the login issued one.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Outcome of the user-info and game-info stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResult {
    pub ok: bool,
    pub message: Option<String>,
    pub raw: Option<String>,
}

impl EndpointResult {
    pub fn cancelled() -> Self {
        Self::failed(CANCELLED)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            raw: None,
        }
    }
}

/// Interprets the identity endpoint's reply to a login post.
///
/// The platform signals success three different ways and they are checked in
/// order: `ok` with a nested `data` object, then `success`, then `code == 0`.
/// A 2xx body that is not a JSON object is taken as an opaque success.
pub fn parse_login(status: StatusCode, body: &str) -> LoginResult {
    let raw = normalize(body);
    if !status.is_success() {
        return LoginResult {
            success: false,
            message: format!("HTTP {}: {}", status.as_u16(), raw),
            token: None,
            raw: Some(raw),
        };
    }

    let root = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(root)) => root,
        _ => {
            return LoginResult {
                success: true,
                message: raw.clone(),
                token: None,
                raw: Some(raw),
            }
        }
    };

    let data = root.get("data").and_then(Value::as_object);
    let mut success = false;
    let mut message = string_field(&root, "reason");
    let mut token = None;

    if root.get("ok") == Some(&Value::Bool(true)) {
        success = true;
        if let Some(data) = data {
            token = string_field(data, "online_token");
            if message.is_none() {
                message = string_field(data, "user_name");
            }
        }
    } else if root.get("success") == Some(&Value::Bool(true)) {
        success = true;
    } else if root.get("code").map_or(false, is_zero) {
        success = true;
    }

    let message = message
        .or_else(|| string_field(&root, "msg"))
        .or_else(|| string_field(&root, "message"))
        .unwrap_or_else(|| body.chars().take(MESSAGE_PREVIEW_CHARS).collect());

    let token = token
        .or_else(|| data.and_then(|d| string_field(d, "online_token")))
        .or_else(|| string_field(&root, "token"));

    LoginResult {
        success,
        message: normalize(&message),
        token,
        raw: Some(raw),
    }
}

/// Builds the transport-level result shared by user-info and game-info.
pub fn endpoint_result(status: StatusCode, body: &str) -> EndpointResult {
    let raw = Some(normalize(body));
    if status.is_success() {
        EndpointResult {
            ok: true,
            message: None,
            raw,
        }
    } else {
        EndpointResult {
            ok: false,
            message: Some(format!("HTTP {}", status.as_u16())),
            raw,
        }
    }
}

/// Renders the start-game reply. Failures are marked only by the `HTTP `
/// prefix, see [`is_start_game_failure`].
pub fn start_game_text(status: StatusCode, body: &str) -> String {
    let text = normalize(body);
    if status.is_success() {
        text
    } else {
        format!("HTTP {}: {}", status.as_u16(), text)
    }
}

/// Renders a start-game request that failed before any reply arrived.
pub fn start_game_transport_failure(message: &str) -> String {
    format!("{}: {}", REQUEST_FAILED, message)
}

/// Whether a start-game reply reports a remote or transport failure: the
/// `HTTP <digits>:` prefix, the `Request failed:` prefix, or [`CANCELLED`].
///
/// A genuine page that happens to begin with one of these is misread as a
/// failure; callers that need certainty should inspect the page themselves.
pub fn is_start_game_failure(text: &str) -> bool {
    if text == CANCELLED || text.starts_with(&format!("{}: ", REQUEST_FAILED)) {
        return true;
    }
    let rest = match text.strip_prefix("HTTP ") {
        Some(rest) => rest,
        None => return false,
    };
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    digits == 3 && rest[digits..].starts_with(':')
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn is_zero(v: &Value) -> bool {
    v.as_i64() == Some(0) || v.as_u64() == Some(0) || v.as_f64() == Some(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_with_nested_data_yields_token_and_username() {
        let r = parse_login(
            StatusCode::OK,
            r#"{"ok":true,"data":{"online_token":"T","user_name":"U"}}"#,
        );
        assert!(r.success);
        assert_eq!(r.token(), Some("T"));
        assert_eq!(r.message, "U");
    }

    #[test]
    fn reason_wins_over_user_name() {
        let r = parse_login(
            StatusCode::OK,
            r#"{"ok":true,"reason":"welcome","data":{"online_token":"T","user_name":"U"}}"#,
        );
        assert_eq!(r.message, "welcome");
    }

    #[test]
    fn success_flag_without_token() {
        let r = parse_login(StatusCode::OK, r#"{"success":true}"#);
        assert!(r.success);
        assert_eq!(r.token, None);
        assert_eq!(r.message, r#"{"success":true}"#);
    }

    #[test]
    fn code_zero_and_top_level_token() {
        let r = parse_login(StatusCode::OK, r#"{"code":0,"msg":"done","token":"abc"}"#);
        assert!(r.success);
        assert_eq!(r.message, "done");
        assert_eq!(r.token(), Some("abc"));
    }

    #[test]
    fn no_recognised_signal_is_failure() {
        let r = parse_login(
            StatusCode::OK,
            r#"{"ok":false,"code":1003,"message":"\u5bc6\u7801\u9519\u8bef"}"#,
        );
        assert!(!r.success);
        assert_eq!(r.message, "密码错误");
    }

    #[test]
    fn later_signals_apply_when_ok_is_false() {
        let r = parse_login(StatusCode::OK, r#"{"ok":false,"code":0}"#);
        assert!(r.success);

        let r = parse_login(StatusCode::OK, r#"{"ok":false,"code":"0"}"#);
        assert!(!r.success);
    }

    #[test]
    fn non_success_status_reports_body() {
        let r = parse_login(StatusCode::UNAUTHORIZED, "bad creds");
        assert!(!r.success);
        assert_eq!(r.message, "HTTP 401: bad creds");
        assert_eq!(r.raw.as_deref(), Some("bad creds"));
    }

    #[test]
    fn non_json_body_is_opaque_success() {
        let r = parse_login(StatusCode::OK, "<html>ok</html>");
        assert!(r.success);
        assert_eq!(r.message, "<html>ok</html>");
        assert_eq!(r.token, None);
    }

    #[test]
    fn long_body_is_previewed() {
        let body = format!(r#"{{"pad":"{}"}}"#, "x".repeat(500));
        let r = parse_login(StatusCode::OK, &body);
        assert!(!r.success);
        assert_eq!(r.message.chars().count(), MESSAGE_PREVIEW_CHARS);
        assert_eq!(r.raw.as_deref(), Some(body.as_str()));
    }

    #[test]
    fn empty_token_is_absent() {
        let r = parse_login(StatusCode::OK, r#"{"ok":true,"data":{"online_token":""}}"#);
        assert!(r.success);
        assert_eq!(r.token, None);
    }

    #[test]
    fn whitespace_token_is_absent() {
        let r = parse_login(StatusCode::OK, r#"{"ok":true,"data":{"online_token":"  "}}"#);
        assert!(r.success);
        assert_eq!(r.token(), None);

        let r = parse_login(
            StatusCode::OK,
            r#"{"ok":true,"data":{"online_token":" \t"},"token":"T"}"#,
        );
        assert_eq!(r.token(), Some("T"));
    }

    #[test]
    fn endpoint_status_mapping() {
        let ok = endpoint_result(StatusCode::OK, r"<p>\u4f60\u597d</p>");
        assert!(ok.ok);
        assert_eq!(ok.raw.as_deref(), Some("<p>你好</p>"));

        let bad = endpoint_result(StatusCode::BAD_GATEWAY, "down");
        assert!(!bad.ok);
        assert_eq!(bad.message.as_deref(), Some("HTTP 502"));
        assert_eq!(bad.raw.as_deref(), Some("down"));
    }

    #[test]
    fn start_game_failure_prefix() {
        assert!(is_start_game_failure(&start_game_text(
            StatusCode::NOT_FOUND,
            "missing"
        )));
        assert!(is_start_game_failure(CANCELLED));
        assert!(!is_start_game_failure("<html>HTTP 500: in text</html>"));
        assert!(!is_start_game_failure(&start_game_text(StatusCode::OK, "<html/>")));
        assert!(is_start_game_failure(&start_game_transport_failure(
            "error sending request"
        )));
        assert!(!is_start_game_failure("Request failed without a colon"));
    }
}
