use crate::ticket::GameTicket;
use serde_json::Value;
use std::fmt;

const COOKIES_MARKER: &str = "\n\nCookies:";

/// Cookie names are case-insensitive; the first spelling seen is kept and a
/// later duplicate only replaces the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders the jar as a `Cookie` request header value.
    pub fn header_value(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn insert(&mut self, name: &str, value: &str) {
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for CookieJar {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut jar = CookieJar::default();
        for (name, value) in iter {
            jar.insert(name, value);
        }
        jar
    }
}

/// Session recovered from a captured "JSON + cookies" text blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSession {
    pub raw_json: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub cookies: CookieJar,
}

impl ParsedSession {
    /// Gateway credential for this session: packed with the user id when one
    /// was captured, otherwise the bare token.
    pub fn game_ticket(&self) -> Option<GameTicket> {
        let token = self.token.as_deref()?;
        Some(match self.user_id.as_deref() {
            Some(user_id) => GameTicket::packed(user_id, token),
            None => GameTicket::Opaque(token.to_string()),
        })
    }
}

impl fmt::Display for ParsedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(username) = &self.username {
            parts.push(format!("UserName={}", username));
        }
        if let Some(user_id) = &self.user_id {
            parts.push(format!("UserId={}", user_id));
        }
        if let Some(token) = &self.token {
            parts.push(format!("OnlineToken={}", token));
        }
        if !self.cookies.is_empty() {
            parts.push(format!("Cookies=[{}]", self.cookies.header_value()));
        }
        write!(f, "{}", parts.join(",\n"))
    }
}

/// Decomposes a captured blob into token, user identity and cookies.
///
/// Never fails: whatever cannot be recovered is left empty.
pub fn parse(blob: &str) -> ParsedSession {
    let mut session = ParsedSession::default();
    if blob.trim().is_empty() {
        return session;
    }

    let blob = blob.replace("\r\n", "\n");
    let (json_part, cookie_part) = match blob.find(COOKIES_MARKER) {
        Some(idx) => (&blob[..idx], &blob[idx + COOKIES_MARKER.len()..]),
        None => (blob.as_str(), ""),
    };

    let json_part = json_part.trim();
    let json_text = match (json_part.find('{'), json_part.rfind('}')) {
        (Some(first), Some(last)) if last > first => &json_part[first..=last],
        _ => json_part,
    };
    session.raw_json = Some(json_text.to_string());

    if let Ok(root) = serde_json::from_str::<Value>(json_text) {
        match root.get("data").filter(|d| d.is_object()) {
            Some(data) => {
                session.token = string_value(data.get("online_token"));
                session.username = string_value(data.get("user_name"));
                session.user_id = data.get("user_id").and_then(scalar_text);
            }
            None => session.token = string_value(root.get("token")),
        }
    }

    session.cookies = cookie_part
        .trim()
        .split(';')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k, v.trim()))
        })
        .collect();

    session
}

fn string_value(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).map(str::to_string)
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
