//! Minimal element tree over quick-xml events.
//!
//! Manifests are small, so the whole document is read into an [`XmlElement`]
//! tree first and interpreted afterwards. Byte-order marks are handled here:
//! UTF-8 marks are stripped, UTF-16 documents (LE or BE) are decoded.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::warn;

use crate::error::{FomodError, Result};

/// One element with its attributes, children and concatenated text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// Attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute that the element cannot do without
    pub fn require_attr(&self, document: &str, name: &str) -> Result<&str> {
        self.attr(name).ok_or_else(|| {
            FomodError::parse(
                document,
                format!("<{}> is missing required attribute '{}'", self.name, name),
            )
        })
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Child element that the element cannot do without
    pub fn require_child(&self, document: &str, name: &str) -> Result<&XmlElement> {
        self.child(name).ok_or_else(|| {
            FomodError::parse(
                document,
                format!("<{}> is missing required element <{}>", self.name, name),
            )
        })
    }

    /// All child elements with the given name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Text of the first child with the given name, if present and non-empty
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|child| child.text.as_str())
            .filter(|text| !text.is_empty())
    }
}

/// Turn raw document bytes into text, honouring byte-order marks
pub fn decode_document(document: &str, bytes: &[u8]) -> Result<String> {
    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => Ok(decode_utf8(document, rest)),
        [0xFF, 0xFE, rest @ ..] => decode_utf16(document, rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(document, rest, u16::from_be_bytes),
        // UTF-16 without a mark still starts with '<'
        [0x3C, 0x00, ..] => decode_utf16(document, bytes, u16::from_le_bytes),
        [0x00, 0x3C, ..] => decode_utf16(document, bytes, u16::from_be_bytes),
        _ => Ok(decode_utf8(document, bytes)),
    }
}

fn decode_utf8(document: &str, bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) => {
            warn!("{} is not valid UTF-8 ({}), decoding lossily", document, err);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

fn decode_utf16(document: &str, bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(FomodError::parse(document, "truncated UTF-16 document"));
    }
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|err| FomodError::parse(document, format!("invalid UTF-16: {}", err)))
}

/// Read a document into its root element
pub fn parse_document(document: &str, bytes: &[u8]) -> Result<XmlElement> {
    let text = decode_document(document, bytes)?;
    parse_str(document, &text)
}

/// Read already-decoded text into its root element
pub fn parse_str(document: &str, text: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|err| {
            FomodError::parse(
                document,
                format!("{} at byte {}", err, reader.buffer_position()),
            )
        })?;

        match event {
            Event::Start(start) => stack.push(open_element(document, &start)?),
            Event::Empty(start) => {
                let element = open_element(document, &start)?;
                attach(document, &mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| FomodError::parse(document, "unbalanced closing tag"))?;
                attach(document, &mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let unescaped = text
                    .unescape()
                    .map_err(|err| FomodError::parse(document, err.to_string()))?;
                append_text(&mut stack, &unescaped);
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                append_text(&mut stack, &String::from_utf8_lossy(&raw));
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctypes
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(FomodError::parse(
            document,
            format!("unexpected end of document inside <{}>", open.name),
        ));
    }
    root.ok_or_else(|| FomodError::parse(document, "document has no root element"))
}

fn open_element(document: &str, start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|err| {
            FomodError::parse(document, format!("bad attribute in <{}>: {}", name, err))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| FomodError::parse(document, err.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        ..Default::default()
    })
}

fn attach(
    document: &str,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(FomodError::parse(
                document,
                format!("second root element <{}>", element.name),
            ));
        }
    }
    Ok(())
}

fn append_text(stack: &mut [XmlElement], text: &str) {
    if let Some(current) = stack.last_mut() {
        current.text.push_str(text.trim());
    }
}
