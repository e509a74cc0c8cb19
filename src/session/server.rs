//! Per-server IRC capability state.
//!
//! One [`IrcServer`] exists per server-type buffer. It mirrors what the
//! relay knows about the IRC connection: ISUPPORT tokens, channel and
//! user mode alphabets, status prefixes, and the current nick. The whole
//! record is rebuilt from scratch on every capability refresh rather
//! than patched incrementally.

use std::collections::HashMap;

use weerelay_proto::HdataEntry;

/// Mirrored IRC server capabilities.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IrcServer {
    /// Server name (the relay's server id, e.g. `libera`).
    pub name: String,
    /// Pointer of the server's buffer.
    pub buffer_ptr: String,
    /// Current nick on this server.
    pub nick: String,
    /// Current user modes string.
    pub user_modes: String,
    /// Parsed ISUPPORT tokens. A key without a value maps to `None`.
    pub isupport: HashMap<String, Option<String>>,
    /// Channel type characters (`#&`).
    pub chantypes: String,
    /// Channel modes, the four comma-separated classes joined.
    pub chanmodes: String,
    /// Status mode letters (`ov`...).
    pub prefix_modes: String,
    /// Status prefix characters (`@+`...), aligned with `prefix_modes`.
    pub prefix_chars: String,
}

impl IrcServer {
    /// Rebuild a server record from an `irc_server` hdata entry.
    pub fn from_entry(entry: &HdataEntry) -> Option<Self> {
        let name = entry.str_field("name")?.to_string();
        let isupport = parse_isupport(entry.str_field("isupport").unwrap_or_default());

        let mut server = Self {
            name,
            buffer_ptr: entry.ptr_field("buffer").unwrap_or_default().to_string(),
            nick: entry.str_field("nick").unwrap_or_default().to_string(),
            user_modes: entry.str_field("nick_modes").unwrap_or_default().to_string(),
            chantypes: entry.str_field("chantypes").unwrap_or_default().to_string(),
            chanmodes: entry.str_field("chanmodes").unwrap_or_default().to_string(),
            prefix_modes: entry
                .str_field("prefix_modes")
                .unwrap_or_default()
                .to_string(),
            prefix_chars: entry
                .str_field("prefix_chars")
                .unwrap_or_default()
                .to_string(),
            isupport,
        };

        // Fall back to ISUPPORT tokens for fields the hdata left empty.
        if server.chantypes.is_empty() {
            if let Some(v) = server.get("CHANTYPES") {
                server.chantypes = v.to_string();
            }
        }
        if server.prefix_modes.is_empty() {
            if let Some((modes, chars)) = server.get("PREFIX").and_then(parse_prefix_token) {
                server.prefix_modes = modes;
                server.prefix_chars = chars;
            }
        }
        Some(server)
    }

    /// Look up an ISUPPORT value by key, case-insensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.isupport
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| v.as_deref())
    }

    /// The advertised network name.
    pub fn network(&self) -> Option<&str> {
        self.get("NETWORK")
    }

    /// The advertised casemapping.
    pub fn casemapping(&self) -> Option<&str> {
        self.get("CASEMAPPING")
    }

    /// The status prefix character for a mode letter, if any.
    pub fn prefix_for_mode(&self, mode: char) -> Option<char> {
        let idx = self.prefix_modes.find(mode)?;
        self.prefix_chars.chars().nth(idx)
    }

    /// Whether a name starts with one of this server's channel types.
    pub fn is_channel_name(&self, name: &str) -> bool {
        let types = if self.chantypes.is_empty() {
            "#&"
        } else {
            &self.chantypes
        };
        name.chars().next().is_some_and(|c| types.contains(c))
    }
}

/// Parse a space-separated ISUPPORT token string into a key/value map.
///
/// Tokens are either bare keys (`EXCEPTS`) or `KEY=value` pairs. A later
/// occurrence of a key wins, matching server retransmission semantics.
pub fn parse_isupport(raw: &str) -> HashMap<String, Option<String>> {
    let mut map = HashMap::new();
    for token in raw.split_whitespace() {
        match token.split_once('=') {
            Some((key, value)) => map.insert(key.to_string(), Some(value.to_string())),
            None => map.insert(token.to_string(), None),
        };
    }
    map
}

/// Split a `PREFIX=(ov)@+` token into mode letters and prefix chars.
fn parse_prefix_token(token: &str) -> Option<(String, String)> {
    let rest = token.strip_prefix('(')?;
    let (modes, chars) = rest.split_once(')')?;
    if modes.len() != chars.len() {
        return None;
    }
    Some((modes.to_string(), chars.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_isupport() {
        let map = parse_isupport("NETWORK=Libera.Chat EXCEPTS CHANTYPES=#");
        assert_eq!(map.get("NETWORK").unwrap().as_deref(), Some("Libera.Chat"));
        assert_eq!(map.get("EXCEPTS"), Some(&None));
        assert_eq!(map.get("CHANTYPES").unwrap().as_deref(), Some("#"));
        assert!(!map.contains_key("PREFIX"));
    }

    #[test]
    fn test_isupport_later_token_wins() {
        let map = parse_isupport("NICKLEN=9 NICKLEN=30");
        assert_eq!(map.get("NICKLEN").unwrap().as_deref(), Some("30"));
    }

    #[test]
    fn test_prefix_token() {
        assert_eq!(
            parse_prefix_token("(ohv)@%+"),
            Some(("ohv".to_string(), "@%+".to_string()))
        );
        assert_eq!(parse_prefix_token("broken"), None);
        assert_eq!(parse_prefix_token("(ov)@"), None);
    }

    #[test]
    fn test_prefix_for_mode() {
        let server = IrcServer {
            prefix_modes: "ov".into(),
            prefix_chars: "@+".into(),
            ..Default::default()
        };
        assert_eq!(server.prefix_for_mode('o'), Some('@'));
        assert_eq!(server.prefix_for_mode('v'), Some('+'));
        assert_eq!(server.prefix_for_mode('q'), None);
    }

    #[test]
    fn test_is_channel_name() {
        let server = IrcServer {
            chantypes: "#".into(),
            ..Default::default()
        };
        assert!(server.is_channel_name("#rust"));
        assert!(!server.is_channel_name("&local"));
        assert!(!server.is_channel_name("alice"));

        let defaulted = IrcServer::default();
        assert!(defaulted.is_channel_name("&local"));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let server = IrcServer {
            isupport: parse_isupport("network=OFTC"),
            ..Default::default()
        };
        assert_eq!(server.network(), Some("OFTC"));
    }
}
