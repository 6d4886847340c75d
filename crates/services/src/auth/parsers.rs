//! Turn raw provider response bodies into flat string mappings.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use std::collections::BTreeMap;

use super::ports::AuthError;

/// Parses `a=1&b=2` bodies (Facebook, Twitter and LinkedIn token responses).
/// Blank values are dropped and a repeated key keeps its last value.
pub fn parse_query_string(body: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Parses a JSON object body. Scalars become their textual form, nested
/// values are kept as compact JSON and nulls are dropped.
pub fn parse_json_object(body: &str) -> Result<BTreeMap<String, String>, AuthError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AuthError::ParseError(format!("Invalid JSON response: {e}")))?;

    let Value::Object(object) = value else {
        return Err(AuthError::ParseError(
            "Expected a JSON object response".to_string(),
        ));
    };

    Ok(object
        .into_iter()
        .filter_map(|(key, value)| json_to_text(value).map(|text| (key, text)))
        .collect())
}

fn json_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested @ (Value::Array(_) | Value::Object(_)) => Some(nested.to_string()),
    }
}

/// Flattens a profile document into `tag -> text` for the direct children
/// of the root element. The first occurrence of a tag wins and children
/// without text are skipped.
pub fn parse_xml_profile(body: &str) -> Result<BTreeMap<String, String>, AuthError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut fields = BTreeMap::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut current: Option<(String, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                saw_root = true;
                if depth == 2 {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    current = Some((tag, String::new()));
                }
            }
            Ok(Event::Empty(_)) => {
                saw_root = true;
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let Some((tag, text)) = current.take() {
                        if !text.is_empty() {
                            fields.entry(tag).or_insert(text);
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(e)) => {
                if depth == 2 {
                    let text = e
                        .unescape()
                        .map_err(|e| AuthError::ParseError(format!("Invalid XML text: {e}")))?;
                    if let Some((_, value)) = current.as_mut() {
                        value.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if depth == 2 {
                    if let Some((_, value)) = current.as_mut() {
                        value.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AuthError::ParseError(format!(
                    "Invalid XML at position {}: {:?}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(AuthError::ParseError("Empty XML document".to_string()));
    }
    if depth != 0 {
        return Err(AuthError::ParseError(
            "Unexpected end of XML document".to_string(),
        ));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_parser() {
        let parsed = parse_query_string("param1=val1&param2=val2");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["param1"], "val1");
        assert_eq!(parsed["param2"], "val2");
    }

    #[test]
    fn test_query_string_decodes_and_drops_blanks() {
        let parsed =
            parse_query_string("oauth_token=a+b%2Fc&oauth_token_secret=&expires=5&expires=7\n");
        assert_eq!(parsed["oauth_token"], "a b/c");
        assert!(!parsed.contains_key("oauth_token_secret"));
        assert_eq!(parsed["expires"], "7");
    }

    #[test]
    fn test_json_parser_flattens_scalars() {
        let parsed = parse_json_object(
            r#"{"id": 12345, "screen_name": "dude", "verified": false,
                "status": {"text": "hi"}, "url": null}"#,
        )
        .unwrap();

        assert_eq!(parsed["id"], "12345");
        assert_eq!(parsed["screen_name"], "dude");
        assert_eq!(parsed["verified"], "false");
        assert_eq!(parsed["status"], r#"{"text":"hi"}"#);
        assert!(!parsed.contains_key("url"));
    }

    #[test]
    fn test_json_parser_rejects_non_objects() {
        assert!(matches!(
            parse_json_object("[1, 2]"),
            Err(AuthError::ParseError(_))
        ));
        assert!(matches!(
            parse_json_object("access_token=abc"),
            Err(AuthError::ParseError(_))
        ));
    }

    #[test]
    fn test_xml_profile_parser() {
        let parsed = parse_xml_profile(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<person>
  <id>AbC123</id>
  <first-name>Jane &amp; Co</first-name>
  <last-name>Doe</last-name>
  <headline/>
  <picture-url>https://media.example.com/p.jpg</picture-url>
  <site-standard-profile-request>
    <url>https://www.example.com/profile?id=1</url>
  </site-standard-profile-request>
  <id>ignored-duplicate</id>
</person>"#,
        )
        .unwrap();

        assert_eq!(parsed["id"], "AbC123");
        assert_eq!(parsed["first-name"], "Jane & Co");
        assert_eq!(parsed["last-name"], "Doe");
        assert_eq!(parsed["picture-url"], "https://media.example.com/p.jpg");
        assert!(!parsed.contains_key("headline"));
        assert!(!parsed.contains_key("site-standard-profile-request"));
        assert!(!parsed.contains_key("url"));
    }

    #[test]
    fn test_xml_profile_parser_rejects_garbage() {
        assert!(parse_xml_profile("").is_err());
        assert!(parse_xml_profile("<person><id>1</id>").is_err());
        assert!(parse_xml_profile("<person><id>1</name></person>").is_err());
    }
}
