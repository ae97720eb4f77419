//! Query string, form and cookie parsing.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::types::ParamList;

/// Form-style decode: `+` is a space, percent escapes decoded lossily.
#[inline]
pub fn form_decode(s: &str) -> String {
    let s: Cow<'_, str> = if s.contains('+') {
        Cow::Owned(s.replace('+', " "))
    } else {
        Cow::Borrowed(s)
    };

    if s.contains('%') {
        percent_encoding::percent_decode_str(&s)
            .decode_utf8_lossy()
            .into_owned()
    } else {
        s.into_owned()
    }
}

/// Split `a=1&b=2` into decoded pairs, skipping empty keys.
pub fn parse_pairs(query: &str) -> ParamList {
    let pair_count = query.matches('&').count() + 1;
    let mut params = Vec::with_capacity(pair_count.min(16));

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = match pair.find('=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, ""),
        };

        if !key.is_empty() {
            params.push((form_decode(key), form_decode(value)));
        }
    }

    params
}

/// Fold decoded pairs into a map.
///
/// `name[]` keys collect into an array under `name`; any other repeated key
/// keeps its last value.
pub fn pairs_to_map<'a, I>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut map = Map::new();
    for (key, value) in pairs {
        match key.strip_suffix("[]") {
            Some(name) if !name.is_empty() => {
                let entry = map
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                match entry {
                    Value::Array(items) => items.push(Value::String(value.to_string())),
                    other => *other = Value::Array(vec![Value::String(value.to_string())]),
                }
            }
            _ => {
                map.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
    }
    map
}

/// Parse a raw query string into a map.
pub fn parse_query_string(query: &str) -> Map<String, Value> {
    let pairs = parse_pairs(query);
    pairs_to_map(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

/// Parse a Cookie header into name-value pairs.
pub fn parse_cookies(cookie_header: &str) -> ParamList {
    let cookie_count = cookie_header.matches(';').count() + 1;
    let mut cookies = Vec::with_capacity(cookie_count.min(16));

    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if cookie.is_empty() {
            continue;
        }

        let (name, value) = match cookie.find('=') {
            Some(pos) => (cookie[..pos].trim(), cookie[pos + 1..].trim()),
            None => continue,
        };

        if !name.is_empty() {
            let value = percent_encoding::percent_decode_str(value.trim_matches('"'))
                .decode_utf8_lossy()
                .into_owned();
            cookies.push((name.to_string(), value));
        }
    }

    cookies
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_query_string() {
        let map = parse_query_string("name=John+Doe&city=S%C3%A3o%20Paulo&empty=&flag");
        assert_eq!(map["name"], "John Doe");
        assert_eq!(map["city"], "São Paulo");
        assert_eq!(map["empty"], "");
        assert_eq!(map["flag"], "");
    }

    #[test]
    fn test_parse_query_arrays_and_last_wins() {
        let map = parse_query_string("tag[]=a&tag[]=b&page=1&page=2&=skipped");
        assert_eq!(Value::Object(map.clone())["tag"], json!(["a", "b"]));
        assert_eq!(map["page"], "2");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_parse_pairs_lossy_decoding() {
        let pairs = parse_pairs("bad=%FF&ok=1");
        assert_eq!(pairs[0].1, "\u{FFFD}");
        assert_eq!(pairs[1], ("ok".to_string(), "1".to_string()));
    }

    #[test]
    fn test_parse_cookies() {
        let cookies = parse_cookies("session=abc123; theme=dark%20blue; broken; quoted=\"v\"");
        assert_eq!(
            cookies,
            vec![
                ("session".to_string(), "abc123".to_string()),
                ("theme".to_string(), "dark blue".to_string()),
                ("quoted".to_string(), "v".to_string()),
            ]
        );
    }
}
