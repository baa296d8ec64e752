use crate::blob::ParsedSession;
use crate::browser::{BrowserLogin, BrowserTransport};
use crate::cancel::Cancellation;
use crate::error::{Result, SessionError};
use crate::response::{self, EndpointResult, LoginResult, CANCELLED};
use crate::ticket::GameTicket;
use log::{debug, info, warn};
use reqwest::{
    header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, COOKIE, ORIGIN, REFERER, USER_AGENT},
    Client, RequestBuilder, StatusCode,
};
use std::sync::OnceLock;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36 Edg/142.0.0.0";
const LANGUAGES: &str = "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7,en-AU;q=0.6";
const ACCEPT_API: &str = "application/json, text/plain, */*";
const ACCEPT_PAGE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

/// The process-wide HTTP client. Built on first use and never dropped, so
/// every pipeline shares one connection pool.
pub fn shared_client() -> Result<Client> {
    if let Some(client) = SHARED_CLIENT.get() {
        return Ok(client.clone());
    }
    let client = Client::builder().build()?;
    Ok(SHARED_CLIENT.get_or_init(|| client).clone())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub platform: String,
    pub server: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        platform: impl Into<String>,
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            server: server.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Hosts and fixed identifiers the pipeline talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub identity_base: String,
    pub start_base: String,
    /// Overrides the gateway host derived from `server_id`.
    pub gateway_base: Option<String>,
    pub portal_referer: String,
    pub server_id: String,
    pub game_id: String,
    pub reign_id: String,
    pub fallback_user_id: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            identity_base: "https://kuaiwan.com".to_string(),
            start_base: "http://kuaiwan.com".to_string(),
            gateway_base: None,
            portal_referer: "http://teeqee.com/".to_string(),
            server_id: "396".to_string(),
            game_id: "9138000".to_string(),
            reign_id: "E1A02DCD249A4D5DAE6DBF5C4EE53651".to_string(),
            fallback_user_id: "kw_258581991".to_string(),
        }
    }
}

impl Endpoints {
    pub fn for_server(server_id: &str) -> Self {
        Self {
            server_id: server_id.to_string(),
            ..Self::default()
        }
    }

    pub fn gateway_base(&self) -> String {
        match &self.gateway_base {
            Some(base) => base.clone(),
            None => format!("http://s{}.gcld2.teeqee.com", self.server_id),
        }
    }

    pub fn login_page(&self) -> String {
        format!("{}/index.html", self.identity_base)
    }
}

/// Replies of the three stages that follow a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResults {
    pub user_info: EndpointResult,
    pub game_info: EndpointResult,
    pub start_game: String,
}

/// Everything the full chain produced for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub login: LoginResult,
    /// `None` when the login issued no usable token.
    pub stages: Option<StageResults>,
}

enum Fetched {
    Reply(StatusCode, String),
    Cancelled,
    Failed(String),
}

/// Drives the login -> user-info -> game-info -> start-game handshake.
///
/// Every stage can be called on its own; [`SessionPipeline::acquire`] chains
/// them. Stage failures come back as values, the only `Err` is a missing token.
#[derive(Debug, Clone)]
pub struct SessionPipeline {
    client: Client,
    endpoints: Endpoints,
}

impl SessionPipeline {
    pub fn new() -> Result<Self> {
        Self::with_endpoints(Endpoints::default())
    }

    pub fn with_endpoints(endpoints: Endpoints) -> Result<Self> {
        Ok(Self {
            client: shared_client()?,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub async fn login(&self, credentials: &Credentials, cancel: &Cancellation) -> LoginResult {
        let url = format!("{}/account/quick/login/", self.endpoints.identity_base);
        let params = [
            ("user_name", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let request = self
            .client
            .post(&url)
            .form(&params)
            .header(ACCEPT, ACCEPT_API)
            .header(ACCEPT_LANGUAGE, LANGUAGES)
            .header(ORIGIN, self.endpoints.identity_base.as_str())
            .header(REFERER, self.endpoints.login_page())
            .header("Sec-Fetch-Dest", "empty")
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Site", "same-origin")
            .header(USER_AGENT, BROWSER_UA)
            .header(
                "sec-ch-ua",
                r#""Chromium";v="142", "Microsoft Edge";v="142", "Not_A Brand";v="99""#,
            )
            .header("sec-ch-ua-mobile", "?0")
            .header("sec-ch-ua-platform", r#""Windows""#);

        debug!("login: POST {} as {}", url, credentials.username);
        let result = match self.fetch("login", request, cancel).await {
            Fetched::Reply(status, body) => response::parse_login(status, &body),
            Fetched::Cancelled => LoginResult::cancelled(),
            Fetched::Failed(message) => LoginResult::failed(message),
        };
        info!(
            "login for {}: success={} token={}",
            credentials.username,
            result.success,
            result.token.is_some()
        );
        result
    }

    /// Runs the login inside a scripted browser instead of a plain post and
    /// reads the final page like a successful login reply.
    pub async fn login_via_browser(
        &self,
        browser: &dyn BrowserTransport,
        credentials: &Credentials,
        cancel: &Cancellation,
    ) -> LoginResult {
        let request = BrowserLogin::for_credentials(self.endpoints.login_page(), credentials);
        debug!("login: browser session at {}", request.login_url);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => LoginResult::cancelled(),
            page = browser.login_and_get_content(&request) => match page {
                Ok(page) => response::parse_login(StatusCode::OK, &page.content),
                Err(e) => {
                    warn!("browser login failed: {}", e);
                    LoginResult::failed(e.to_string())
                }
            },
        }
    }

    pub async fn user_info(&self, token: &str, cancel: &Cancellation) -> Result<EndpointResult> {
        require_token("user-info", token)?;
        let url = format!("{}/account/getuserinfo/", self.endpoints.identity_base);
        let request = self
            .client
            .get(&url)
            .query(&[("online_token", token)])
            .header(ACCEPT, ACCEPT_API)
            .header(ACCEPT_LANGUAGE, LANGUAGES)
            .header(REFERER, self.endpoints.login_page())
            .header("Sec-Fetch-Dest", "empty")
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Site", "same-origin")
            .header(USER_AGENT, BROWSER_UA);

        debug!("user-info: GET {}", url);
        Ok(self.endpoint("user-info", request, cancel).await)
    }

    /// Logs into the game gateway. `token` is either a bare ticket or a packed
    /// `userId|ticket|timestamp` triple.
    pub async fn game_info(&self, token: &str, cancel: &Cancellation) -> Result<EndpointResult> {
        require_token("game-info", token)?;
        Ok(self.gateway_login(&GameTicket::parse(token), cancel).await)
    }

    pub async fn gateway_login(&self, ticket: &GameTicket, cancel: &Cancellation) -> EndpointResult {
        let login = ticket.resolve(
            &self.endpoints.fallback_user_id,
            chrono::Utc::now().timestamp(),
        );
        let url = format!("{}/root/gateway.action", self.endpoints.gateway_base());
        let request = self
            .client
            .get(&url)
            .query(&[
                ("command", "login"),
                ("yx", "teeqee"),
                ("userId", login.user_id.as_str()),
                ("tp", login.timestamp.as_str()),
                ("adult", "1"),
                ("ticket", login.ticket.as_str()),
            ])
            .header(ACCEPT, ACCEPT_PAGE)
            .header(ACCEPT_LANGUAGE, LANGUAGES)
            .header(CONNECTION, "keep-alive")
            .header(REFERER, self.endpoints.portal_referer.as_str())
            .header("Upgrade-Insecure-Requests", "1")
            .header(USER_AGENT, BROWSER_UA)
            .header(
                COOKIE,
                format!("REIGNID={}; ticket={}", self.endpoints.reign_id, login.ticket),
            );

        debug!("game-info: GET {} for user {}", url, login.user_id);
        self.endpoint("game-info", request, cancel).await
    }

    /// Fetches the session start page. The reply is opaque: failures are only
    /// recognisable by [`response::is_start_game_failure`].
    pub async fn start_game(&self, token: &str, cancel: &Cancellation) -> Result<String> {
        require_token("start-game", token)?;
        let url = format!("{}/gameapi/page/start/", self.endpoints.start_base);
        let request = self
            .client
            .get(&url)
            .query(&[
                ("u_token", token),
                ("m_id", self.endpoints.game_id.as_str()),
                ("channel", "undefined"),
                ("s_id", self.endpoints.server_id.as_str()),
                ("is_exe", "0"),
            ])
            .header(ACCEPT, ACCEPT_PAGE)
            .header(ACCEPT_LANGUAGE, LANGUAGES)
            .header(CONNECTION, "keep-alive")
            .header(REFERER, self.endpoints.portal_referer.as_str())
            .header("Upgrade-Insecure-Requests", "1")
            .header(USER_AGENT, BROWSER_UA);

        debug!("start-game: GET {}", url);
        Ok(match self.fetch("start-game", request, cancel).await {
            Fetched::Reply(status, body) => response::start_game_text(status, &body),
            Fetched::Cancelled => CANCELLED.to_string(),
            Fetched::Failed(message) => response::start_game_transport_failure(&message),
        })
    }

    /// Runs the three post-login stages in order with one token.
    pub async fn follow_up(
        &self,
        token: &str,
        ticket: &GameTicket,
        cancel: &Cancellation,
    ) -> Result<StageResults> {
        let user_info = self.user_info(token, cancel).await?;
        let game_info = self.gateway_login(ticket, cancel).await;
        let start_game = self.start_game(token, cancel).await?;
        Ok(StageResults {
            user_info,
            game_info,
            start_game,
        })
    }

    /// The whole handshake for one account. Stops after the login when no
    /// token was issued.
    pub async fn acquire(&self, credentials: &Credentials, cancel: &Cancellation) -> SessionOutcome {
        let login = self.login(credentials, cancel).await;
        let stages = match login.token() {
            Some(token) => match self.follow_up(token, &GameTicket::parse(token), cancel).await {
                Ok(stages) => Some(stages),
                Err(e) => {
                    warn!("{}: {}", credentials.username, e);
                    None
                }
            },
            None => {
                info!("no token issued for {}, stopping after login", credentials.username);
                None
            }
        };
        SessionOutcome { login, stages }
    }

    /// Continues a session captured from a browser instead of logging in.
    pub async fn resume(&self, session: &ParsedSession, cancel: &Cancellation) -> Result<StageResults> {
        let token = session.token.as_deref().unwrap_or_default();
        let ticket = session
            .game_ticket()
            .ok_or(SessionError::EmptyToken { stage: "resume" })?;
        self.follow_up(token, &ticket, cancel).await
    }

    async fn endpoint(
        &self,
        stage: &'static str,
        request: RequestBuilder,
        cancel: &Cancellation,
    ) -> EndpointResult {
        match self.fetch(stage, request, cancel).await {
            Fetched::Reply(status, body) => response::endpoint_result(status, &body),
            Fetched::Cancelled => EndpointResult::cancelled(),
            Fetched::Failed(message) => EndpointResult::failed(message),
        }
    }

    async fn fetch(
        &self,
        stage: &'static str,
        request: RequestBuilder,
        cancel: &Cancellation,
    ) -> Fetched {
        let exchange = async {
            let res = request.send().await?;
            let status = res.status();
            let body = res.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("{}: cancelled", stage);
                Fetched::Cancelled
            }
            res = exchange => match res {
                Ok((status, body)) => {
                    debug!("{}: HTTP {} ({} bytes)", stage, status.as_u16(), body.len());
                    Fetched::Reply(status, body)
                }
                Err(e) => {
                    // The url carries the token in its query.
                    let e = e.without_url();
                    warn!("{}: {}", stage, e);
                    Fetched::Failed(e.to_string())
                }
            },
        }
    }
}

fn require_token(stage: &'static str, token: &str) -> Result<()> {
    if token.trim().is_empty() {
        return Err(SessionError::EmptyToken { stage });
    }
    Ok(())
}
