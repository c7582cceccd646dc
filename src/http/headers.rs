//! Header utilities shared by the forward and relay paths.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers, including those named in `Connection`
//! - Chain `X-Forwarded-For`

use std::net::IpAddr;

use axum::http::header::{CONNECTION, TE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that only apply to a single transport connection.
pub const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove headers listed in the comma-separated `Connection` value(s).
pub fn remove_connection_headers(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .filter_map(|field| HeaderName::from_bytes(field.as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
}

/// Remove `Connection`-named headers and the fixed hop-by-hop set.
pub fn remove_hop_by_hop(headers: &mut HeaderMap) {
    remove_connection_headers(headers);
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Whether the client announced it accepts trailers (`TE: trailers`).
pub fn accepts_trailers(headers: &HeaderMap) -> bool {
    headers
        .get_all(TE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|field| field.trim().eq_ignore_ascii_case("trailers"))
}

/// Append `client_ip` to `X-Forwarded-For`, joining prior values with ", ".
pub fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let chained = if prior.is_empty() {
        client_ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), client_ip)
    };

    if let Ok(value) = HeaderValue::from_str(&chained) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn strips_fixed_and_connection_named_headers() {
        let mut map = headers(&[
            ("connection", "close, X-Session"),
            ("x-session", "abc"),
            ("keep-alive", "timeout=5"),
            ("proxy-authorization", "Basic Zm9v"),
            ("transfer-encoding", "chunked"),
            ("upgrade", "h2c"),
            ("te", "trailers"),
            ("trailer", "Expires"),
            ("content-type", "text/plain"),
        ]);

        remove_hop_by_hop(&mut map);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("content-type").unwrap(), "text/plain");
    }

    #[test]
    fn connection_tokens_across_multiple_values() {
        let mut map = headers(&[
            ("connection", "x-a"),
            ("connection", " x-b ,"),
            ("x-a", "1"),
            ("x-b", "2"),
            ("x-c", "3"),
        ]);

        remove_connection_headers(&mut map);

        assert!(map.get("x-a").is_none());
        assert!(map.get("x-b").is_none());
        assert_eq!(map.get("x-c").unwrap(), "3");
    }

    #[test]
    fn forwarded_for_first_hop_sets_client_ip() {
        let mut map = HeaderMap::new();
        append_forwarded_for(&mut map, "10.0.0.7".parse().unwrap());
        assert_eq!(map.get(X_FORWARDED_FOR).unwrap(), "10.0.0.7");
    }

    #[test]
    fn forwarded_for_appends_to_all_prior_values() {
        let mut map = headers(&[
            ("x-forwarded-for", "1.1.1.1"),
            ("x-forwarded-for", "2.2.2.2, 3.3.3.3"),
        ]);
        append_forwarded_for(&mut map, "::1".parse().unwrap());

        let values: Vec<_> = map.get_all(X_FORWARDED_FOR).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "1.1.1.1, 2.2.2.2, 3.3.3.3, ::1");
    }

    #[test]
    fn detects_te_trailers() {
        assert!(accepts_trailers(&headers(&[("te", "gzip, Trailers")])));
        assert!(!accepts_trailers(&headers(&[("te", "gzip")])));
        assert!(!accepts_trailers(&HeaderMap::new()));
    }
}
