//! String-level converters: SIP URIs, NAPTR names, hex and URL encodings,
//! prefix/suffix stripping.

use std::net::IpAddr;

use url::{form_urlencoded, Url};

use crate::error::ConvertError;

/// Which parts of a SIP message or URI to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SipPart {
    Host,
    User,
    Method,
}

/// Extract a part of a SIP request line or URI, e.g. from
/// `INVITE sip:1002@192.168.58.203:5060;transport=udp SIP/2.0`.
/// Missing parts yield the empty string.
pub fn sip_uri_part(input: &str, part: SipPart) -> String {
    let input = input.trim();
    let first_token = input.split_whitespace().next().unwrap_or("");

    if part == SipPart::Method {
        return if is_sip_uri(first_token) || first_token.contains(':') {
            String::new()
        } else {
            first_token.to_string()
        };
    }

    let uri = input
        .split_whitespace()
        .map(|token| token.trim_start_matches('<'))
        .find(|token| is_sip_uri(token))
        .unwrap_or(first_token);
    let uri = uri
        .strip_prefix("sips:")
        .or_else(|| uri.strip_prefix("sip:"))
        .unwrap_or(uri);
    let uri = uri.split(['>', ';', '?']).next().unwrap_or("");

    let (userinfo, hostport) = match uri.rfind('@') {
        Some(at) => (&uri[..at], &uri[at + 1..]),
        None => ("", uri),
    };

    match part {
        SipPart::User => userinfo.split(':').next().unwrap_or("").to_string(),
        _ => host_without_port(hostport).to_string(),
    }
}

fn is_sip_uri(token: &str) -> bool {
    token.starts_with("sip:") || token.starts_with("sips:")
}

fn host_without_port(hostport: &str) -> &str {
    if let Some(rest) = hostport.strip_prefix('[') {
        // IPv6 reference
        return rest.split(']').next().unwrap_or("");
    }
    hostport.split(':').next().unwrap_or("")
}

/// Domain part of a NAPTR record name: everything from `.e164.` on,
/// without surrounding dots.
pub fn e164_domain(name: &str) -> String {
    let tail = match name.find(".e164.") {
        Some(at) => &name[at..],
        None => name,
    };
    tail.trim_matches('.').to_string()
}

/// E.164 number encoded in a NAPTR record name:
/// `4.3.2.1.6.9.4.e164.arpa` is `4961234`.
pub fn e164_number(name: &str) -> Result<String, ConvertError> {
    let at = name.find(".e164.").ok_or_else(|| ConvertError::Failed {
        converter: "*e164",
        reason: "unknown format".to_string(),
    })?;
    Ok(name[..at].chars().filter(|c| *c != '.').rev().collect())
}

/// IP address as `0x` followed by the last 4 bytes in hex. Text that is not
/// an IP address yields the empty string.
pub fn ip_to_hex(input: &str) -> String {
    let octets = match input.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.to_ipv6_mapped().octets(),
        Ok(IpAddr::V6(v6)) => v6.octets(),
        Err(_) => return String::new(),
    };
    format!("0x{}", hex::encode(&octets[12..]))
}

/// Bytes of the input as `0x`-prefixed hex; empty input stays empty.
pub fn string_to_hex(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    format!("0x{}", hex::encode(input.as_bytes()))
}

/// Decode a query-escaped string: `+` is a space and `%XX` a byte.
pub fn url_decode(input: &str) -> Result<String, ConvertError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let escape = bytes.get(i + 1..i + 3).filter(|pair| pair.iter().all(u8::is_ascii_hexdigit));
                let Some(pair) = escape else {
                    let end = (i + 3).min(bytes.len());
                    return Err(ConvertError::Failed {
                        converter: "*urldecode",
                        reason: format!(
                            "invalid URL escape \"{}\"",
                            String::from_utf8_lossy(&bytes[i..end])
                        ),
                    });
                };
                let mut decoded = [0u8; 1];
                hex::decode_to_slice(pair, &mut decoded).map_err(|err| ConvertError::Failed {
                    converter: "*urldecode",
                    reason: err.to_string(),
                })?;
                out.push(decoded[0]);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|err| ConvertError::Failed {
        converter: "*urldecode",
        reason: err.to_string(),
    })
}

/// Escape a string for use in a URL.
///
/// Absolute URLs with a host keep their structure and get their query
/// re-encoded with keys in sorted order; anything else is query-escaped as
/// a whole.
pub fn url_encode(input: &str) -> String {
    match Url::parse(input) {
        Ok(mut url) if url.host().is_some() => {
            if url.query().is_some_and(|q| !q.is_empty()) {
                let mut pairs: Vec<(String, String)> = url
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                pairs.sort_by(|a, b| a.0.cmp(&b.0));
                let query = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish();
                url.set_query(Some(&query));
            }
            url.to_string()
        }
        _ => form_urlencoded::byte_serialize(input.as_bytes()).collect(),
    }
}

/// Side of a string affected by `*strip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripSide {
    Prefix,
    Suffix,
    Both,
}

/// What `*strip` removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StripTarget {
    /// A fixed number of bytes
    Amount(usize),
    /// Every leading/trailing character contained in the set
    CharSet(String),
    /// One occurrence of the exact text
    Exact(String),
    /// Nothing: a zero or negative repeat count was configured
    Nothing,
}

/// Parsed `*strip:<side>:...` definition.
///
/// Accepted forms:
/// * `*strip:<side>:<amount>` removes `amount` bytes;
/// * `*strip:<side>:*nil|*space[:<amount>]` removes NUL or space
///   characters, all of them or exactly `amount` of them;
/// * `*strip:<side>:*char:<text>[:<amount>]` removes any of the characters
///   in `text`, or `text` repeated `amount` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripSpec {
    pub side: StripSide,
    pub target: StripTarget,
}

impl StripSpec {
    /// Parse the full converter text, `*strip` included.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let params: Vec<&str> = spec.split(':').collect();
        if !(3..=5).contains(&params.len()) {
            return Err(
                "strip converter: invalid number of parameters (should have 3, 4 or 5)".to_string(),
            );
        }

        let side = match params[1] {
            "*prefix" => StripSide::Prefix,
            "*suffix" => StripSide::Suffix,
            "*both" => StripSide::Both,
            _ => return Err("strip converter: invalid side parameter".to_string()),
        };

        let target = match params[2] {
            "" => return Err("strip converter: substr parameter cannot be empty".to_string()),
            "*nil" | "*space" => {
                if params.len() == 5 {
                    return Err(
                        "strip converter: cannot have 5 params in *nil/*space case".to_string()
                    );
                }
                let unit = if params[2] == "*nil" { "\0" } else { " " };
                match params.get(3) {
                    Some(amount) => repeated(unit, parse_amount(amount)?),
                    None => StripTarget::CharSet(unit.to_string()),
                }
            }
            "*char" => {
                let text = params.get(3).copied().unwrap_or("");
                if text.is_empty() {
                    return Err(
                        "strip converter: usage of *char implies the need of 4 or 5 non-empty params"
                            .to_string(),
                    );
                }
                match params.get(4) {
                    Some(amount) => repeated(text, parse_amount(amount)?),
                    None => StripTarget::CharSet(text.to_string()),
                }
            }
            amount => {
                if params.len() > 3 {
                    return Err(
                        "strip converter: just the amount specified, cannot have more than 3 params"
                            .to_string(),
                    );
                }
                match parse_amount(amount)? {
                    n if n > 0 => StripTarget::Amount(n as usize),
                    _ => StripTarget::Nothing,
                }
            }
        };

        Ok(Self { side, target })
    }

    pub fn apply(&self, input: &str) -> String {
        match &self.target {
            StripTarget::Nothing => input.to_string(),
            StripTarget::Amount(n) => {
                let bytes = input.as_bytes();
                let n = *n;
                let kept = match self.side {
                    StripSide::Prefix if n < bytes.len() => &bytes[n..],
                    StripSide::Suffix if n < bytes.len() => &bytes[..bytes.len() - n],
                    StripSide::Both if n * 2 < bytes.len() => &bytes[n..bytes.len() - n],
                    _ => &[],
                };
                String::from_utf8_lossy(kept).into_owned()
            }
            StripTarget::CharSet(set) => {
                let in_set = |c: char| set.contains(c);
                match self.side {
                    StripSide::Prefix => input.trim_start_matches(in_set),
                    StripSide::Suffix => input.trim_end_matches(in_set),
                    StripSide::Both => input.trim_matches(in_set),
                }
                .to_string()
            }
            StripTarget::Exact(text) => {
                let text = text.as_str();
                let mut out = input;
                if matches!(self.side, StripSide::Prefix | StripSide::Both) {
                    out = out.strip_prefix(text).unwrap_or(out);
                }
                if matches!(self.side, StripSide::Suffix | StripSide::Both) {
                    out = out.strip_suffix(text).unwrap_or(out);
                }
                out.to_string()
            }
        }
    }
}

fn parse_amount(text: &str) -> Result<i64, String> {
    text.parse::<i64>()
        .map_err(|err| format!("strip converter: invalid amount parameter ({err})"))
}

fn repeated(unit: &str, amount: i64) -> StripTarget {
    if amount <= 0 {
        StripTarget::Nothing
    } else {
        StripTarget::Exact(unit.repeat(amount as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVITE: &str = "INVITE sip:1002@192.168.58.203:5060;transport=udp SIP/2.0";

    #[test]
    fn test_sip_uri_parts() {
        assert_eq!(sip_uri_part(INVITE, SipPart::Method), "INVITE");
        assert_eq!(sip_uri_part(INVITE, SipPart::User), "1002");
        assert_eq!(sip_uri_part(INVITE, SipPart::Host), "192.168.58.203");

        let uri = "<sip:alice:secret@atlanta.com>";
        assert_eq!(sip_uri_part(uri, SipPart::User), "alice");
        assert_eq!(sip_uri_part(uri, SipPart::Host), "atlanta.com");
        assert_eq!(sip_uri_part("sip:atlanta.com", SipPart::Method), "");
        assert_eq!(sip_uri_part("sip:atlanta.com", SipPart::User), "");
        assert_eq!(sip_uri_part("sip:bob@[2001:db8::1]:5060", SipPart::Host), "2001:db8::1");
    }

    #[test]
    fn test_e164() {
        let name = "4.3.2.1.6.9.4.e164.arpa";
        assert_eq!(e164_domain(name), "e164.arpa");
        assert_eq!(e164_number(name).unwrap(), "4961234");
        assert!(e164_number("cgrates.org").is_err());
        assert_eq!(e164_domain(".cgrates.org."), "cgrates.org");
    }

    #[test]
    fn test_ip_to_hex() {
        assert_eq!(ip_to_hex("127.0.0.1"), "0x7f000001");
        assert_eq!(ip_to_hex("62.87.114.244"), "0x3e5772f4");
        assert_eq!(ip_to_hex("::ffff:127.0.0.1"), "0x7f000001");
        assert_eq!(ip_to_hex("not an ip"), "");
    }

    #[test]
    fn test_string_to_hex() {
        assert_eq!(string_to_hex("127.0.0.1"), "0x3132372e302e302e31");
        assert_eq!(string_to_hex(""), "");
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("a%20b+c%2Fd").unwrap(), "a b c/d");
        assert_eq!(url_decode("plain").unwrap(), "plain");
        let err = url_decode("bad%zzescape").unwrap_err();
        assert_eq!(err.to_string(), "*urldecode: invalid URL escape \"%zz\"");
        assert!(url_decode("trailing%4").is_err());
    }

    #[test]
    fn test_url_encode() {
        assert_eq!(url_encode("a b&c"), "a+b%26c");
        assert_eq!(
            url_encode("https://cgrates.org/path?b=2 3&a=1"),
            "https://cgrates.org/path?a=1&b=2+3"
        );
    }

    #[test]
    fn test_strip_amounts() {
        let spec = StripSpec::parse("*strip:*prefix:2").unwrap();
        assert_eq!(spec.apply("abcdef"), "cdef");
        let spec = StripSpec::parse("*strip:*suffix:2").unwrap();
        assert_eq!(spec.apply("abcdef"), "abcd");
        let spec = StripSpec::parse("*strip:*both:3").unwrap();
        assert_eq!(spec.apply("abcdef"), "");
        let spec = StripSpec::parse("*strip:*prefix:0").unwrap();
        assert_eq!(spec.apply("abcdef"), "abcdef");
    }

    #[test]
    fn test_strip_characters() {
        let spec = StripSpec::parse("*strip:*suffix:*nil").unwrap();
        assert_eq!(spec.apply("value\0\0\0"), "value");
        let spec = StripSpec::parse("*strip:*both:*space:2").unwrap();
        assert_eq!(spec.apply("   value   "), " value ");
        let spec = StripSpec::parse("*strip:*prefix:*char:ab").unwrap();
        assert_eq!(spec.apply("abbaXab"), "Xab");
        let spec = StripSpec::parse("*strip:*prefix:*char:ab:2").unwrap();
        assert_eq!(spec.apply("ababab"), "ab");
    }

    #[test]
    fn test_strip_parse_errors() {
        for bad in [
            "*strip",
            "*strip:*prefix",
            "*strip:*left:2",
            "*strip:*prefix:",
            "*strip:*prefix:*nil:1:2",
            "*strip:*prefix:*char",
            "*strip:*prefix:2:3",
            "*strip:*prefix:x",
        ] {
            assert!(StripSpec::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
