use regex::Regex;
use std::sync::OnceLock;

const ESCAPE_LEN: usize = 6;

fn escape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\u[0-9A-Fa-f]{4}").unwrap())
}

/// Replaces literal `\uXXXX` escapes with the characters they name.
///
/// Servers on the platform sometimes double-encode their JSON, so bodies arrive
/// with `\u7528\u6237` in place of real text. Sequences that do not name a
/// character (lone surrogates) are kept verbatim; a high/low pair becomes one
/// character. Decoding is a single left-to-right scan in which every decoded
/// character is checked again against the text before it, so the result is
/// stable under a second pass.
pub fn normalize(text: &str) -> String {
    if !escape_re().is_match(text) {
        return text.to_string();
    }
    let mut out: Vec<char> = Vec::with_capacity(text.len());
    for c in text.chars() {
        out.push(c);
        while decode_tail(&mut out) {}
    }
    out.into_iter().collect()
}

/// Decodes the escape that ends `out`, if there is one. Returns whether `out`
/// changed.
fn decode_tail(out: &mut Vec<char>) -> bool {
    let unit = match escape_ending_at(out, out.len()) {
        Some(unit) => unit,
        None => return false,
    };
    let decoded = if (0xDC00..0xE000).contains(&unit) {
        match escape_ending_at(out, out.len() - ESCAPE_LEN) {
            Some(high) if (0xD800..0xDC00).contains(&high) => {
                char::from_u32(0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00))
                    .map(|c| (c, 2 * ESCAPE_LEN))
            }
            _ => None,
        }
    } else {
        char::from_u32(unit).map(|c| (c, ESCAPE_LEN))
    };
    match decoded {
        Some((c, len)) => {
            out.truncate(out.len() - len);
            out.push(c);
            true
        }
        None => false,
    }
}

/// Code unit of the `\uXXXX` escape occupying `chars[end - 6..end]`.
fn escape_ending_at(chars: &[char], end: usize) -> Option<u32> {
    let start = end.checked_sub(ESCAPE_LEN)?;
    match &chars[start..end] {
        ['\\', 'u', digits @ ..] => digits
            .iter()
            .try_fold(0u32, |acc, d| Some(acc * 16 + d.to_digit(16)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escape_all(s: &str) -> String {
        s.encode_utf16().map(|u| format!("\\u{:04x}", u)).collect()
    }

    #[test]
    fn decodes_chinese_message() {
        assert_eq!(normalize(r"\u7528\u6237\u540d\u9519\u8bef"), "用户名错误");
    }

    #[test]
    fn leaves_plain_text_alone() {
        let s = "<html>ok</html> {\"a\":1}";
        assert_eq!(normalize(s), s);
    }

    #[test]
    fn round_trips_escaped_sample() {
        let original = "快玩 login ok! 傲世堂/唐门 😀";
        assert_eq!(normalize(&escape_all(original)), original);
    }

    #[test]
    fn keeps_malformed_and_lone_surrogates() {
        assert_eq!(normalize(r"\u12 and \uZZZZ"), r"\u12 and \uZZZZ");
        assert_eq!(normalize(r"x\ud800y"), r"x\ud800y");
        assert_eq!(normalize(r"A\udc00"), r"A\udc00");
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            r"\u0041",
            r"\\u00750041",
            r"\u005c\u0041",
            r"plain",
            r"你好",
            r"😀 \udc00",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input {:?}", s);
        }
    }

    #[test]
    fn deeply_nested_escapes_collapse() {
        let mut s = String::from(r"\u005c");
        s.push_str(&"u005c".repeat(200_000));
        assert_eq!(normalize(&s), "\\");
        assert_eq!(normalize(r"\u004\u0031"), "A");
    }

    #[test]
    fn handles_json_escaped_backslash() {
        assert_eq!(normalize(r#"{"reason":"\\u5bc6\\u7801"}"#), r#"{"reason":"\密\码"}"#);
    }
}
