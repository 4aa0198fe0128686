//! clamd reply parsing.
//!
//! Replies look like `<name>: OK`, `<name>: <signature> FOUND` or
//! `<name>: <message> ERROR`, terminated by a null byte for `z` commands.

use crate::ScanVerdict;

/// Interpret one clamd scan reply.
pub fn parse_reply(raw: &[u8]) -> ScanVerdict {
    let text = String::from_utf8_lossy(raw);
    let reply = text.trim_end_matches('\0').trim();

    if reply.is_empty() {
        return ScanVerdict::Error {
            reason: "empty reply from daemon".to_string(),
        };
    }

    let body = match reply.rsplit_once(": ") {
        Some((_, body)) => body.trim(),
        None => reply,
    };

    if body == "OK" {
        ScanVerdict::Clean
    } else if let Some(signature) = body.strip_suffix(" FOUND") {
        ScanVerdict::Infected {
            signature: signature.trim().to_string(),
        }
    } else if body.ends_with("ERROR") {
        ScanVerdict::Error {
            reason: reply.to_string(),
        }
    } else {
        ScanVerdict::Error {
            reason: format!("unexpected reply from daemon: {reply}"),
        }
    }
}

/// Whether a `PING` reply is the expected `PONG`.
pub fn is_pong(raw: &[u8]) -> bool {
    String::from_utf8_lossy(raw).trim_end_matches('\0').trim() == "PONG"
}
