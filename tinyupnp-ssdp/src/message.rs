//! Wire text: NOTIFY announcements, search replies and M-SEARCH parsing

use std::time::SystemTime;

use rand::Rng;

use tinyupnp_http::http_date;

use crate::entry::SsdpEntry;
use crate::SSDP_GROUP;

/// Cap on the jittered search response delay in milliseconds
const MAX_RESPONSE_DELAY_MS: u64 = 5000;

/// `ssdp:alive` announcement for one entry
pub fn alive(entry: &SsdpEntry, server: &str, max_age: u64) -> String {
    format!(
        "NOTIFY * HTTP/1.1\r\n\
         HOST: {}\r\n\
         CACHE-CONTROL: max-age={}\r\n\
         LOCATION: {}\r\n\
         NT: {}\r\n\
         NTS: ssdp:alive\r\n\
         SERVER: {}\r\n\
         USN: {}\r\n\r\n",
        SSDP_GROUP, max_age, entry.location, entry.nt, server, entry.usn,
    )
}

/// `ssdp:byebye` announcement for one entry
pub fn byebye(entry: &SsdpEntry) -> String {
    format!(
        "NOTIFY * HTTP/1.1\r\n\
         HOST: {}\r\n\
         NT: {}\r\n\
         NTS: ssdp:byebye\r\n\
         USN: {}\r\n\r\n",
        SSDP_GROUP, entry.nt, entry.usn,
    )
}

/// Unicast 200 reply to a matched search
pub fn search_response(entry: &SsdpEntry, st: &str, server: &str, max_age: u64) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age={}\r\n\
         DATE: {}\r\n\
         EXT:\r\n\
         LOCATION: {}\r\n\
         SERVER: {}\r\n\
         ST: {}\r\n\
         USN: {}\r\n\r\n",
        max_age,
        http_date(SystemTime::now()),
        entry.location,
        server,
        st,
        entry.usn,
    )
}

/// A parsed M-SEARCH query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MSearch {
    pub st: String,
    /// Maximum response delay the searcher will wait, in seconds
    pub mx: u64,
}

/// Parse an incoming datagram as an M-SEARCH
///
/// Requires the `M-SEARCH * HTTP/1.1` request line and a
/// `MAN: "ssdp:discover"` header; anything else (including the group's
/// own NOTIFY traffic) is ignored. Parsing stops at the blank line.
pub fn parse_msearch(text: &str) -> Option<MSearch> {
    let mut lines = text.split("\r\n");
    let request_line = lines.next()?;
    let mut tokens = request_line.split_whitespace();
    if tokens.next()? != "M-SEARCH" || tokens.next()? != "*" {
        return None;
    }
    if !tokens.next()?.starts_with("HTTP/1.") {
        return None;
    }

    let mut man_ok = false;
    let mut st: Option<String> = None;
    let mut mx = 1u64;
    for line in lines {
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("man") {
            man_ok = value.trim_matches('"') == "ssdp:discover";
        } else if name.eq_ignore_ascii_case("st") {
            st = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("mx") {
            mx = value.parse().unwrap_or(1);
        }
    }

    if !man_ok {
        return None;
    }
    Some(MSearch { st: st?, mx })
}

/// Select the entries answering a search target
///
/// Returns the entries to reply for, paired with the ST to echo.
/// `upnp:rootdevice` selects root announcements, `ssdp:all` everything
/// (echoing each entry's own NT), and any other target matches typed
/// entries by case-insensitive prefix. A trailing `**` on the target is
/// ignored, as sent by some consumer control points.
pub fn matches<'a>(entries: &'a [SsdpEntry], st: &str) -> Vec<(&'a SsdpEntry, String)> {
    if st == "ssdp:all" {
        return entries.iter().map(|e| (e, e.nt.clone())).collect();
    }
    if st == "upnp:rootdevice" {
        return entries
            .iter()
            .filter(|e| e.nt == "upnp:rootdevice")
            .map(|e| (e, st.to_string()))
            .collect();
    }
    let target = st.strip_suffix("**").unwrap_or(st);
    // Compare as bytes; a searcher-chosen ST length must never slice an
    // NT inside a multi-byte character.
    entries
        .iter()
        .filter(|e| {
            e.nt
                .as_bytes()
                .get(..target.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(target.as_bytes()))
        })
        .map(|e| (e, st.to_string()))
        .collect()
}

/// Jittered delay before a unicast search reply
///
/// Spread inside the searcher's MX window, never beyond five seconds.
pub fn response_delay_ms(mx: u64, rng: &mut impl Rng) -> u64 {
    let cap = (mx.saturating_mul(1000)).min(MAX_RESPONSE_DELAY_MS);
    if cap <= 500 {
        return cap;
    }
    rng.gen_range(500..=cap)
}
