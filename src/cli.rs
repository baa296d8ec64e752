use kuaiwan_auth::{Cancellation, Endpoints};
use std::{path::PathBuf, time::Duration};
use structopt::StructOpt;

/// A program to acquire a Kuaiwan game session from account credentials or a captured browser session
#[derive(StructOpt, Debug)]
#[structopt()]
pub struct Args {
    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Log in and walk the user-info, gateway and start-game stages
    Login(LoginArgs),

    /// Decode a captured "JSON + Cookies:" blob and continue its session
    Parse {
        /// File holding the captured text
        #[structopt(parse(from_os_str))]
        blob: PathBuf,

        /// Only print the decoded session, do not contact the servers
        #[structopt(long)]
        offline: bool,

        #[structopt(short, long, default_value = "396")]
        server: String,
    },
}

#[derive(StructOpt, Debug)]
pub struct LoginArgs {
    /// Username of account to log in
    #[structopt(short, long, required_unless = "accounts")]
    pub username: Option<String>,

    /// Password of account to log in
    #[structopt(short, long, required_unless = "accounts")]
    pub password: Option<String>,

    /// File with one `username:password` per line; accounts are logged in one after another
    #[structopt(short, long, parse(from_os_str), conflicts_with = "username")]
    pub accounts: Option<PathBuf>,

    /// Game server number
    #[structopt(short, long, default_value = "396")]
    pub server: String,

    #[structopt(long, default_value = "kuaiwan")]
    pub platform: String,

    /// Abandon an account's session chain after this many seconds
    #[structopt(long)]
    pub deadline_secs: Option<u64>,

    /// Identity host, e.g. https://kuaiwan.com
    #[structopt(long)]
    pub identity_base: Option<String>,

    /// Gateway host; derived from the server number when omitted
    #[structopt(long)]
    pub gateway_base: Option<String>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::from_args()
    }
}

impl LoginArgs {
    pub fn endpoints(&self) -> Endpoints {
        let mut endpoints = Endpoints::for_server(&self.server);
        if let Some(base) = &self.identity_base {
            endpoints.identity_base = base.trim_end_matches('/').to_string();
        }
        endpoints.gateway_base = self
            .gateway_base
            .as_ref()
            .map(|base| base.trim_end_matches('/').to_string());
        endpoints
    }

    pub fn cancellation(&self) -> Cancellation {
        match self.deadline_secs {
            Some(secs) => Cancellation::after(Duration::from_secs(secs)),
            None => Cancellation::never(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_account_overrides() {
        let args = Args::from_iter([
            "kuaiwan-auth",
            "login",
            "-u",
            "alice",
            "-p",
            "secret",
            "-s",
            "401",
            "--identity-base",
            "http://localhost:8080/",
        ]);
        let login = match args.command {
            Command::Login(login) => login,
            other => panic!("unexpected command {:?}", other),
        };
        let endpoints = login.endpoints();
        assert_eq!(endpoints.server_id, "401");
        assert_eq!(endpoints.identity_base, "http://localhost:8080");
        assert_eq!(endpoints.gateway_base(), "http://s401.gcld2.teeqee.com");
        assert!(!login.cancellation().is_cancelled());
    }

    #[test]
    fn accounts_file_replaces_credentials() {
        let args = Args::from_iter_safe(["kuaiwan-auth", "login", "--accounts", "accounts.txt"]);
        assert!(args.is_ok());
        let missing = Args::from_iter_safe(["kuaiwan-auth", "login"]);
        assert!(missing.is_err());
    }
}
