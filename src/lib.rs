//! Session acquisition for the Kuaiwan game portal.
//!
//! A login posts credentials to the identity host and yields an online token;
//! the token is then chained through user-info, the per-server game gateway and
//! the session start page. A session captured from a browser can be decoded
//! with [`blob::parse`] and resumed without a fresh login.

pub mod blob;
pub mod browser;
pub mod cancel;
pub mod error;
pub mod pipeline;
pub mod response;
pub mod ticket;
pub mod unicode;

pub use blob::{CookieJar, ParsedSession};
pub use browser::{BrowserLogin, BrowserPage, BrowserTransport, DisabledBrowser};
pub use cancel::{CancelHandle, Cancellation};
pub use error::SessionError;
pub use pipeline::{Credentials, Endpoints, SessionOutcome, SessionPipeline, StageResults};
pub use response::{is_start_game_failure, EndpointResult, LoginResult};
pub use ticket::{GameTicket, GatewayLogin};
