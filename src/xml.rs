use anyhow::{bail, Result};
use serde_json::{Map, Value};

// One frame per open element: tag name, accumulated attrs/children, text.
struct Frame {
    name: String,
    map: Map<String, Value>,
    text: String,
}

/// Decode an XML document into an attribute-typed JSON tree.
///
/// Shape rules (what the rest of the crate relies on):
/// - element attributes merge into the element's object, no prefix
/// - child elements nest under their tag name; a repeated tag becomes an array
/// - mixed text lands under `"text"`; a text-only element collapses to a scalar
/// - scalars that look numeric are parsed as numbers, values are trimmed
/// - namespace prefixes are dropped (`ns2:subject` keys as `subject`)
pub fn decode(xml: &str) -> Result<Value> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root = Map::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                stack.push(Frame {
                    name: local_name(&String::from_utf8_lossy(e.name().as_ref())),
                    map: attr_map(&e)?,
                    text: String::new(),
                });
            }
            Ok(quick_xml::events::Event::Empty(e)) => {
                let name = local_name(&String::from_utf8_lossy(e.name().as_ref()));
                let map = attr_map(&e)?;
                let value = if map.is_empty() {
                    Value::String(String::new())
                } else {
                    Value::Object(map)
                };
                insert_child(parent_map(&mut stack, &mut root), &name, value);
            }
            Ok(quick_xml::events::Event::Text(e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&e.unescape()?);
                }
            }
            Ok(quick_xml::events::Event::CData(e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(quick_xml::events::Event::End(_)) => {
                let frame = match stack.pop() {
                    Some(f) => f,
                    None => bail!("unbalanced closing tag"),
                };
                let value = finish_frame(frame.map, &frame.text);
                insert_child(parent_map(&mut stack, &mut root), &frame.name, value);
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    if let Some(frame) = stack.last() {
        bail!("unclosed element <{}>", frame.name);
    }
    Ok(Value::Object(root))
}

fn attr_map(e: &quick_xml::events::BytesStart) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr.unescape_value()?.into_owned();
        map.insert(local_name(&key), parse_scalar(value.trim()));
    }
    Ok(map)
}

fn local_name(qualified: &str) -> String {
    qualified
        .rsplit_once(':')
        .map(|(_, local)| local)
        .unwrap_or(qualified)
        .to_string()
}

fn parent_map<'a>(
    stack: &'a mut Vec<Frame>,
    root: &'a mut Map<String, Value>,
) -> &'a mut Map<String, Value> {
    match stack.last_mut() {
        Some(frame) => &mut frame.map,
        None => root,
    }
}

fn finish_frame(mut map: Map<String, Value>, text: &str) -> Value {
    let text = text.trim();
    if map.is_empty() {
        return parse_scalar(text);
    }
    if !text.is_empty() {
        map.insert("text".to_string(), parse_scalar(text));
    }
    Value::Object(map)
}

/// Nest `value` under `name`; a second occurrence of the same tag turns the
/// slot into an array, further occurrences append. This is the only place the
/// single-vs-collection collapse is produced; `project::tree::resolve` is the
/// only place it is consumed.
fn insert_child(parent: &mut Map<String, Value>, name: &str, value: Value) {
    match parent.get_mut(name) {
        None => {
            parent.insert(name.to_string(), value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

fn parse_scalar(s: &str) -> Value {
    if s.is_empty() {
        return Value::String(String::new());
    }
    let digits = |t: &str| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit());
    if digits(s) || (s.strip_prefix('-').map(digits) == Some(true)) {
        if let Ok(n) = s.parse::<i64>() {
            return Value::Number(n.into());
        }
    }
    Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attrs_and_text_merge() {
        let tree = decode(r#"<subject id="AAS" href="http://x">Asian American Studies</subject>"#)
            .unwrap();
        assert_eq!(
            tree,
            json!({"subject": {"id": "AAS", "href": "http://x", "text": "Asian American Studies"}})
        );
    }

    #[test]
    fn repeated_tag_becomes_array() {
        let tree = decode("<terms><termDetail id=\"1\"/><termDetail id=\"2\"/></terms>").unwrap();
        assert_eq!(
            tree["terms"]["termDetail"],
            json!([{"id": 1}, {"id": 2}])
        );
    }

    #[test]
    fn single_tag_stays_bare_object() {
        let tree = decode("<terms><termDetail id=\"1\"/></terms>").unwrap();
        assert_eq!(tree["terms"]["termDetail"], json!({"id": 1}));
    }

    #[test]
    fn text_only_element_collapses_to_scalar() {
        let tree = decode("<course><label>Intro to CS</label><id>411</id></course>").unwrap();
        assert_eq!(tree["course"]["label"], json!("Intro to CS"));
        assert_eq!(tree["course"]["id"], json!(411));
    }

    #[test]
    fn numeric_attrs_parse_but_dates_do_not() {
        let tree = decode(r#"<s id="30107" startDate="2020-08-24"/>"#).unwrap();
        assert_eq!(tree["s"]["id"], json!(30107));
        assert_eq!(tree["s"]["startDate"], json!("2020-08-24"));
    }

    #[test]
    fn cdata_and_entities_unescape() {
        let tree =
            decode("<c><description><![CDATA[A & B]]></description><note>x &amp; y</note></c>")
                .unwrap();
        assert_eq!(tree["c"]["description"], json!("A & B"));
        assert_eq!(tree["c"]["note"], json!("x & y"));
    }

    #[test]
    fn namespace_prefixes_are_dropped() {
        let tree = decode(
            r#"<ns2:subject xmlns:ns2="http://rest.example" id="CS"><label>CS</label></ns2:subject>"#,
        )
        .unwrap();
        assert_eq!(tree["subject"]["id"], json!("CS"));
        assert_eq!(tree["subject"]["label"], json!("CS"));
        assert!(tree["subject"].get("xmlns:ns2").is_none());
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(decode("<a><b></a>").is_err());
        assert!(decode("<a>").is_err());
    }
}
