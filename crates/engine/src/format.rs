//! Output serializers for the `~P`, `~X` and `~Y` transformations.
//!
//! All three expect their input to be deep-resolved already; the evaluator
//! runs the tree walker over the value before calling into this module.

use itertools::Itertools;
use nexl_value::{Mapping, Value};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::NexlError;

/// Flattens a mapping into newline-joined `path=value` lines, one per leaf,
/// with nested keys joined by dots.
pub fn to_key_value_lines(mapping: &Mapping) -> String {
    let mut lines = Vec::new();
    flatten(mapping, &mut Vec::new(), &mut lines);
    lines.join("\n")
}

fn flatten(mapping: &Mapping, path: &mut Vec<String>, lines: &mut Vec<String>) {
    for (key, value) in mapping {
        path.push(key.clone());
        match value {
            Value::Mapping(nested) => flatten(nested, path, lines),
            leaf => lines.push(format!("{}={}", path.iter().join("."), leaf)),
        }
        path.pop();
    }
}

/// Serializes a mapping as an XML document under the given root element.
/// Sequence values repeat their parent element once per item.
pub fn to_xml(root: &str, mapping: &Mapping) -> Result<String, NexlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, root, mapping)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    mapping: &Mapping,
) -> Result<(), NexlError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    for (key, value) in mapping {
        write_value(writer, key, value)?;
    }
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_value(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), NexlError> {
    match value {
        Value::Mapping(nested) => write_element(writer, name, nested),
        Value::Sequence(items) => {
            for item in items {
                write_value(writer, name, item)?;
            }
            Ok(())
        }
        leaf => {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            writer.write_event(Event::Text(BytesText::new(&leaf.to_string())))?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
            Ok(())
        }
    }
}

/// Serializes a mapping as a YAML document.
pub fn to_yaml(mapping: &Mapping) -> Result<String, NexlError> {
    Ok(serde_yaml::to_string(&Value::Mapping(mapping.clone()).to_json())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Mapping {
        let mut inner = Mapping::new();
        inner.insert("port".into(), Value::Number(8080.0));
        let mut outer = Mapping::new();
        outer.insert("name".into(), Value::String("web".into()));
        outer.insert("server".into(), Value::Mapping(inner));
        outer
    }

    #[test]
    fn test_key_value_lines_flatten_nested_keys() {
        assert_eq!(to_key_value_lines(&sample()), "name=web\nserver.port=8080");
    }

    #[test]
    fn test_xml_document_structure() {
        let xml = to_xml("root", &sample()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<name>web</name>"));
        assert!(xml.contains("<port>8080</port>"));
        assert!(xml.contains("</root>"));
    }

    #[test]
    fn test_xml_repeats_element_per_sequence_item() {
        let mut mapping = Mapping::new();
        mapping.insert(
            "host".into(),
            Value::Sequence(vec![Value::String("a".into()), Value::String("b".into())]),
        );
        let xml = to_xml("hosts", &mapping).unwrap();
        assert!(xml.contains("<host>a</host>"));
        assert!(xml.contains("<host>b</host>"));
    }

    #[test]
    fn test_yaml_output() {
        let yaml = to_yaml(&sample()).unwrap();
        assert!(yaml.contains("name: web"));
        assert!(yaml.contains("port: 8080"));
    }
}
