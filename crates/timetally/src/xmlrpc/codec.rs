//! 🧬 The codec: `Value` in, angle brackets out, and back again.
//!
//! Encoding is string building with escaping. Decoding reads quick-xml events into a
//! tiny element tree first, then interprets the tree. Two passes, zero tears (some tears).

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use super::RpcError;
use super::value::Value;

// ===== Encoding =====

/// 📨 Render a `<methodCall>` document for `method` with positional `params`.
pub(crate) fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(r#"<?xml version="1.0"?><methodCall><methodName>"#);
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Int(i) => out.push_str(&format!("<int>{i}</int>")),
        Value::Bool(b) => out.push_str(if *b {
            "<boolean>1</boolean>"
        } else {
            "<boolean>0</boolean>"
        }),
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Double(d) => out.push_str(&format!("<double>{d}</double>")),
        Value::DateTime(dt) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&escape(dt.as_str()));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(b64) => {
            out.push_str("<base64>");
            out.push_str(b64);
            out.push_str("</base64>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

// ===== Decoding =====

/// 🌳 A parsed element: its local name, its concatenated text, its child elements.
#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn named(raw: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(raw).into_owned(),
            ..Self::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn malformed(msg: impl Into<String>) -> RpcError {
    RpcError::Malformed(msg.into())
}

fn innermost(stack: &mut [Element]) -> Result<&mut Element, RpcError> {
    stack
        .last_mut()
        .ok_or_else(|| malformed("closing tag without an opening tag"))
}

fn parse_document(xml: &str) -> Result<Element, RpcError> {
    let mut reader = Reader::from_str(xml);
    // -- 🌱 the synthetic root catches the document element (and stray whitespace)
    let mut stack = vec![Element::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => stack.push(Element::named(tag.local_name().as_ref())),
            Ok(Event::Empty(tag)) => {
                let leaf = Element::named(tag.local_name().as_ref());
                innermost(&mut stack)?.children.push(leaf);
            }
            Ok(Event::End(_)) => {
                let done = stack
                    .pop()
                    .ok_or_else(|| malformed("closing tag without an opening tag"))?;
                innermost(&mut stack)?.children.push(done);
            }
            Ok(Event::Text(text)) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| malformed(format!("bad text node: {e}")))?;
                innermost(&mut stack)?.text.push_str(&unescaped);
            }
            Ok(Event::CData(cdata)) => {
                let raw = cdata.into_inner();
                innermost(&mut stack)?
                    .text
                    .push_str(&String::from_utf8_lossy(&raw));
            }
            Ok(Event::Eof) => break,
            // -- 💤 declarations, comments, processing instructions: scenery
            Ok(_) => {}
            Err(e) => return Err(malformed(format!("XML syntax error: {e}"))),
        }
    }

    match stack.len() {
        1 => stack
            .pop()
            .ok_or_else(|| malformed("document vanished mid-parse")),
        _ => Err(malformed("document ended with unclosed elements")),
    }
}

/// 📬 Decode a `<methodResponse>` into its single return value, or its fault.
pub(crate) fn decode_response(xml: &str) -> Result<Value, RpcError> {
    let document = parse_document(xml)?;
    let response = document
        .child("methodResponse")
        .ok_or_else(|| malformed("missing <methodResponse>"))?;

    if let Some(fault) = response.child("fault") {
        let detail = fault
            .child("value")
            .ok_or_else(|| malformed("<fault> without a <value>"))
            .and_then(decode_value)?;
        // -- 🧯 some servers send numeric fault codes, the ERP often sends strings. we take both.
        let code = match detail.get("faultCode") {
            Some(Value::Int(i)) => i.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => "unknown".to_string(),
        };
        let message = detail
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(RpcError::Fault { code, message });
    }

    response
        .child("params")
        .and_then(|params| params.child("param"))
        .and_then(|param| param.child("value"))
        .ok_or_else(|| malformed("response has neither <params> nor <fault>"))
        .and_then(decode_value)
}

fn decode_value(node: &Element) -> Result<Value, RpcError> {
    match node.children.first() {
        // -- 📜 an untyped <value> is a string, whitespace and all
        None => Ok(Value::String(node.text.clone())),
        Some(typed) => decode_typed(typed),
    }
}

fn decode_typed(node: &Element) -> Result<Value, RpcError> {
    let text = node.text.trim();
    match node.name.as_str() {
        "int" | "i4" | "i8" => text
            .parse()
            .map(Value::Int)
            .map_err(|_| malformed(format!("'{text}' is not an <{}>", node.name))),
        "boolean" => match text {
            "1" | "true" => Ok(Value::Bool(true)),
            "0" | "false" => Ok(Value::Bool(false)),
            other => Err(malformed(format!("'{other}' is not a <boolean>"))),
        },
        "double" => text
            .parse()
            .map(Value::Double)
            .map_err(|_| malformed(format!("'{text}' is not a <double>"))),
        "string" => Ok(Value::String(node.text.clone())),
        "dateTime.iso8601" => Ok(Value::DateTime(text.to_string())),
        "base64" => Ok(Value::Base64(text.to_string())),
        "nil" => Ok(Value::Nil),
        "array" => {
            let data = node
                .child("data")
                .ok_or_else(|| malformed("<array> without <data>"))?;
            data.children
                .iter()
                .filter(|c| c.name == "value")
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in node.children.iter().filter(|c| c.name == "member") {
                let name = member
                    .child("name")
                    .ok_or_else(|| malformed("<member> without <name>"))?;
                let value = member
                    .child("value")
                    .ok_or_else(|| malformed(format!("<member> '{}' without <value>", name.text)))?;
                members.insert(name.text.clone(), decode_value(value)?);
            }
            Ok(Value::Struct(members))
        }
        other => Err(malformed(format!("unknown value type <{other}>"))),
    }
}
