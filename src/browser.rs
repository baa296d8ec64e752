use crate::blob::CookieJar;
use crate::error::{Result, SessionError};
use crate::pipeline::Credentials;
use async_trait::async_trait;
use log::warn;
use serde::Deserialize;

/// What a scripted browser needs to perform a form login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserLogin {
    pub login_url: String,
    pub user_selector: String,
    pub password_selector: String,
    /// Pressing Enter in the password field submits when unset.
    pub submit_selector: Option<String>,
    pub username: String,
    pub password: String,
}

impl BrowserLogin {
    pub fn for_credentials(login_url: impl Into<String>, credentials: &Credentials) -> Self {
        Self {
            login_url: login_url.into(),
            user_selector: "input[name=user_name]".to_string(),
            password_selector: "input[name=password]".to_string(),
            submit_selector: None,
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        }
    }
}

/// Final page of a browser login and the cookie jar serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserPage {
    pub content: String,
    pub cookies_json: String,
}

#[derive(Debug, Deserialize)]
struct BrowserCookie {
    name: String,
    value: String,
}

impl BrowserPage {
    /// Decodes the `[{"name":..,"value":..}, ..]` jar; unreadable jars are empty.
    pub fn cookies(&self) -> CookieJar {
        match serde_json::from_str::<Vec<BrowserCookie>>(&self.cookies_json) {
            Ok(cookies) => cookies
                .iter()
                .map(|c| (c.name.as_str(), c.value.as_str()))
                .collect(),
            Err(e) => {
                warn!("ignoring unreadable browser cookie jar: {}", e);
                CookieJar::default()
            }
        }
    }
}

/// Alternate login transport for pages that need JavaScript to hand out a token.
#[async_trait]
pub trait BrowserTransport: Send + Sync {
    async fn login_and_get_content(&self, request: &BrowserLogin) -> Result<BrowserPage>;
}

/// Stand-in used when no browser automation is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBrowser;

#[async_trait]
impl BrowserTransport for DisabledBrowser {
    async fn login_and_get_content(&self, _request: &BrowserLogin) -> Result<BrowserPage> {
        Err(SessionError::Browser(
            "browser automation is not available in this build".to_string(),
        ))
    }
}
