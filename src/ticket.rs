use std::fmt;

/// Credential presented to a per-server game gateway.
///
/// Callers hand the gateway stage either a bare ticket or a packed
/// `userId|ticket|timestamp` triple; the string is resolved into this type once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameTicket {
    Opaque(String),
    Packed {
        raw: String,
        user_id: Option<String>,
        ticket: Option<String>,
        timestamp: Option<String>,
    },
}

/// Query values actually sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayLogin {
    pub user_id: String,
    pub ticket: String,
    pub timestamp: String,
}

impl GameTicket {
    pub fn parse(token: &str) -> Self {
        if !token.contains('|') {
            return GameTicket::Opaque(token.to_string());
        }
        let mut parts = token.split('|').map(|p| {
            let p = p.trim();
            (!p.is_empty()).then(|| p.to_string())
        });
        GameTicket::Packed {
            raw: token.to_string(),
            user_id: parts.next().flatten(),
            ticket: parts.next().flatten(),
            timestamp: parts.next().flatten(),
        }
    }

    /// Packs a known user id with a ticket, leaving the timestamp to default.
    pub fn packed(user_id: &str, ticket: &str) -> Self {
        Self::parse(&format!("{}|{}|", user_id, ticket))
    }

    /// Fills the parts the ticket does not carry. A packed value without its
    /// ticket part falls back to the whole string it was parsed from.
    pub fn resolve(&self, fallback_user_id: &str, now: i64) -> GatewayLogin {
        match self {
            GameTicket::Opaque(ticket) => GatewayLogin {
                user_id: fallback_user_id.to_string(),
                ticket: ticket.clone(),
                timestamp: now.to_string(),
            },
            GameTicket::Packed {
                raw,
                user_id,
                ticket,
                timestamp,
            } => GatewayLogin {
                user_id: user_id.clone().unwrap_or_else(|| fallback_user_id.to_string()),
                ticket: ticket.clone().unwrap_or_else(|| raw.to_string()),
                timestamp: timestamp.clone().unwrap_or_else(|| now.to_string()),
            },
        }
    }
}

impl fmt::Display for GameTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameTicket::Opaque(ticket) => f.write_str(ticket),
            GameTicket::Packed { raw, .. } => f.write_str(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_triple_overrides_every_default() {
        let ticket = GameTicket::parse("u123|tk456|999");
        let login = ticket.resolve("kw_0", 42);
        assert_eq!(login.user_id, "u123");
        assert_eq!(login.ticket, "tk456");
        assert_eq!(login.timestamp, "999");
    }

    #[test]
    fn bare_ticket_uses_defaults() {
        let ticket = GameTicket::parse("abcdef");
        assert_eq!(ticket, GameTicket::Opaque("abcdef".into()));
        let login = ticket.resolve("kw_0", 42);
        assert_eq!(login.user_id, "kw_0");
        assert_eq!(login.ticket, "abcdef");
        assert_eq!(login.timestamp, "42");
    }

    #[test]
    fn blank_parts_fall_back() {
        let login = GameTicket::parse("|| ").resolve("kw_0", 7);
        assert_eq!(login.user_id, "kw_0");
        assert_eq!(login.ticket, "|| ");
        assert_eq!(login.timestamp, "7");

        let login = GameTicket::parse("u1|").resolve("kw_0", 7);
        assert_eq!(login.user_id, "u1");
        assert_eq!(login.ticket, "u1|");
    }

    #[test]
    fn display_keeps_original_text() {
        assert_eq!(GameTicket::parse("u|t|1").to_string(), "u|t|1");
        assert_eq!(GameTicket::parse("t").to_string(), "t");
    }
}
