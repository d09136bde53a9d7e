//! Purpose: Convert XML documents (FHIR-style `value` attributes included) into JSON objects.
//! Exports: `xml_to_json`, `XML_TAG_NAME_KEY`.
//! Role: XML branch of the converter dispatch.
//! Invariants: The root tag name is reported under `_xmlTagName`.
//! Invariants: Leaf elements collapse to strings (text, or a lone `value` attribute).
//! Invariants: Repeated sibling names become arrays in document order.
use std::error::Error as StdError;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};

pub const XML_TAG_NAME_KEY: &str = "_xmlTagName";
const TEXT_KEY: &str = "_text";
const VALUE_ATTR: &str = "value";

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

pub fn xml_to_json(input: &str) -> Result<Value, Error> {
    if input.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let root = parse_tree(input)?;

    let mut object = match element_value(&root) {
        Value::Object(map) => map,
        Value::String(text) if text.is_empty() => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert(TEXT_KEY.to_string(), other);
            map
        }
    };
    object.insert(XML_TAG_NAME_KEY.to_string(), Value::String(root.name));
    Ok(Value::Object(object))
}

fn parse_tree(input: &str) -> Result<Element, Error> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|err| xml_error(err, position))?;
        match event {
            Event::Start(start) => stack.push(start_element(&start, position)?),
            Event::Empty(start) => {
                let element = start_element(&start, position)?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| parse_error("unexpected closing tag", position))?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|err| xml_error(err, position))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(parse_error("unclosed element at end of input", input.len() as u64));
    }
    root.ok_or_else(|| parse_error("document has no root element", 0))
}

fn start_element(start: &BytesStart<'_>, position: u64) -> Result<Element, Error> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| xml_error(err, position))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|err| xml_error(err, position))?
            .into_owned();
        let local = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        attrs.push((local, value));
    }
    Ok(Element {
        name,
        attrs,
        ..Element::default()
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: u64,
) -> Result<(), Error> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(parse_error("document has more than one root element", position));
    }
    *root = Some(element);
    Ok(())
}

fn element_value(element: &Element) -> Value {
    let text = element.text.trim();
    if element.children.is_empty() {
        match element.attrs.as_slice() {
            [] => return Value::String(text.to_string()),
            [(key, value)] if key == VALUE_ATTR && text.is_empty() => {
                return Value::String(value.clone());
            }
            _ => {}
        }
    }

    let mut object = Map::new();
    for (key, value) in &element.attrs {
        object.insert(key.clone(), Value::String(value.clone()));
    }
    for child in &element.children {
        let value = element_value(child);
        match object.get_mut(&child.name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(child.name.clone(), value);
            }
        }
    }
    if !text.is_empty() {
        object.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
    }
    Value::Object(object)
}

fn parse_error(message: &str, position: u64) -> Error {
    Error::new(ErrorKind::Parse)
        .with_message(format!("invalid XML: {message} (byte {position})"))
}

fn xml_error(err: impl StdError + Send + Sync + 'static, position: u64) -> Error {
    parse_error(&err.to_string(), position).with_source(err)
}

#[cfg(test)]
mod tests {
    use super::xml_to_json;
    use crate::core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn collapses_text_and_value_attributes() {
        let out = xml_to_json(r#"<root><given>a</given><family value="B" /></root>"#)
            .expect("convert");
        assert_eq!(out, json!({ "given": "a", "family": "B", "_xmlTagName": "root" }));
    }

    #[test]
    fn nested_and_repeated_elements() {
        let out = xml_to_json(
            r#"<?xml version="1.0"?>
            <Patient xmlns="http://hl7.org/fhir">
                <id value="example"/>
                <name>
                    <family value="Chalmers"/>
                    <given value="Peter"/>
                    <given value="James"/>
                    <given value="Jim"/>
                </name>
                <telecom use="home" system="phone"/>
            </Patient>"#,
        )
        .expect("convert");
        assert_eq!(
            out,
            json!({
                "id": "example",
                "name": { "family": "Chalmers", "given": ["Peter", "James", "Jim"] },
                "telecom": { "use": "home", "system": "phone" },
                "_xmlTagName": "Patient"
            })
        );
    }

    #[test]
    fn mixed_text_is_kept() {
        let out = xml_to_json(r#"<note lang="en">hello &amp; bye</note>"#).expect("convert");
        assert_eq!(out, json!({ "lang": "en", "_text": "hello & bye", "_xmlTagName": "note" }));
    }

    #[test]
    fn empty_input_is_empty_object() {
        assert_eq!(xml_to_json("  ").expect("convert"), json!({}));
    }

    #[test]
    fn malformed_xml_is_parse_error() {
        let err = xml_to_json("<root><a></b></root>").expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::Parse);
        let err = xml_to_json("<root><a>").expect_err("unclosed");
        assert_eq!(err.kind(), ErrorKind::Parse);
        let err = xml_to_json("just text").expect_err("no root");
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
