use anyhow::{bail, Context, Result};
use std::{fs::read_to_string, path::Path};

pub struct Account {
    pub username: String,
    pub password: String,
}

pub fn read_acc_file(path: &Path) -> Result<Vec<Account>> {
    let text = read_to_string(path)
        .with_context(|| format!("Failed to read accounts file {}", path.display()))?;
    parse_accounts(&text)
}

/// One `username:password` per line. Only the first colon separates, so
/// passwords may contain colons.
pub fn parse_accounts(text: &str) -> Result<Vec<Account>> {
    let mut acc_vec = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (username, password) = match line.split_once(':') {
            Some((u, p)) if !u.is_empty() => (u, p),
            _ => bail!(
                "Failed to parse accounts file at line {}: expected username:password",
                number + 1
            ),
        };
        acc_vec.push(Account {
            username: username.to_string(),
            password: password.to_string(),
        });
    }
    Ok(acc_vec)
}

pub fn read_blob(path: &Path) -> Result<String> {
    read_to_string(path).with_context(|| format!("Failed to read captured blob {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_colon_and_skips_blanks() {
        let accounts = parse_accounts("alice:pw\n\n  bob:a:b:c  \n").unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].username, "alice");
        assert_eq!(accounts[1].password, "a:b:c");
    }

    #[test]
    fn rejects_line_without_separator() {
        let err = parse_accounts("alice:pw\nbroken").err().unwrap();
        assert!(err.to_string().contains("line 2"));
        assert!(parse_accounts(":nouser").is_err());
    }
}
