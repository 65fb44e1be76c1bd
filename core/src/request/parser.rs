use std::collections::HashMap;

/// Decode `key=value&...` pairs; malformed or undecodable pairs are skipped.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) if !key.is_empty() => Some((
                    urlencoding::decode(&key.replace('+', " ")).ok()?.into_owned(),
                    urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned(),
                )),
                _ => None,
            }
        })
        .collect()
}
