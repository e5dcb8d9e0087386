//! Incoming WeChat messages.
//!
//! WeChat posts one flat XML document per callback:
//!
//! ```text
//! <xml>
//!   <ToUserName><![CDATA[gh_123]]></ToUserName>
//!   <FromUserName><![CDATA[o_user]]></FromUserName>
//!   <CreateTime>1348831860</CreateTime>
//!   <MsgType><![CDATA[text]]></MsgType>
//!   <Content><![CDATA[hello]]></Content>
//!   <MsgId>1234567890123456</MsgId>
//! </xml>
//! ```

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::error::ParseError;

/// A decoded message delivered to the robot.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Account that received the message (`ToUserName`)
    pub target: String,
    /// User that sent the message (`FromUserName`)
    pub source: String,
    /// Unix time the platform created the message
    pub time: i64,
    /// Platform message id; events carry none
    pub id: Option<String>,
    pub kind: MessageKind,
    /// Every element of the envelope, keyed by element name
    pub raw: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Text {
        content: String,
    },
    Image {
        url: String,
        media_id: String,
    },
    Voice {
        media_id: String,
        format: String,
        recognition: Option<String>,
    },
    Video {
        media_id: String,
        thumb_media_id: String,
    },
    Location {
        x: f64,
        y: f64,
        scale: i64,
        label: String,
    },
    Link {
        title: String,
        description: String,
        url: String,
    },
    Event(EventKind),
    Unknown {
        msg_type: String,
    },
}

/// Event pushes (`MsgType` = `event`).
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Follow; `key` is set when following through a QR code
    Subscribe { key: Option<String>, ticket: Option<String> },
    Unsubscribe,
    /// Already-following user scanned a parametric QR code
    Scan { key: String, ticket: Option<String> },
    /// Periodic location report
    Location {
        latitude: f64,
        longitude: f64,
        precision: f64,
    },
    /// Custom menu button
    Click { key: String },
    /// Custom menu link
    View { url: String },
    Other { name: String, key: Option<String> },
}

impl Message {
    /// Name used to route the message to handlers.
    ///
    /// Plain messages use their `MsgType`; events use the event name, with
    /// location reports named `location_event`.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            MessageKind::Text { .. } => "text",
            MessageKind::Image { .. } => "image",
            MessageKind::Voice { .. } => "voice",
            MessageKind::Video { .. } => "video",
            MessageKind::Location { .. } => "location",
            MessageKind::Link { .. } => "link",
            MessageKind::Event(event) => match event {
                EventKind::Subscribe { .. } => "subscribe",
                EventKind::Unsubscribe => "unsubscribe",
                EventKind::Scan { .. } => "scan",
                EventKind::Location { .. } => "location_event",
                EventKind::Click { .. } => "click",
                EventKind::View { .. } => "view",
                EventKind::Other { name, .. } => name.as_str(),
            },
            MessageKind::Unknown { .. } => "unknown",
        }
    }

    /// Text content of a text message.
    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::Text { content } => Some(content.as_str()),
            _ => None,
        }
    }
}

/// Parse a raw callback body into a `Message`.
pub fn parse_user_msg(body: &[u8]) -> Result<Message, ParseError> {
    let xml = std::str::from_utf8(body)?;
    if xml.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let raw = parse_elements(xml)?;
    let msg_type = required(&raw, "MsgType")?.to_string();

    let kind = match msg_type.as_str() {
        "text" => MessageKind::Text {
            content: text(&raw, "Content"),
        },
        "image" => MessageKind::Image {
            url: text(&raw, "PicUrl"),
            media_id: text(&raw, "MediaId"),
        },
        "voice" => MessageKind::Voice {
            media_id: text(&raw, "MediaId"),
            format: text(&raw, "Format"),
            recognition: optional(&raw, "Recognition"),
        },
        "video" | "shortvideo" => MessageKind::Video {
            media_id: text(&raw, "MediaId"),
            thumb_media_id: text(&raw, "ThumbMediaId"),
        },
        "location" => MessageKind::Location {
            x: number(&raw, "Location_X")?,
            y: number(&raw, "Location_Y")?,
            scale: integer(&raw, "Scale")?,
            label: text(&raw, "Label"),
        },
        "link" => MessageKind::Link {
            title: text(&raw, "Title"),
            description: text(&raw, "Description"),
            url: text(&raw, "Url"),
        },
        "event" => MessageKind::Event(parse_event(&raw)?),
        _ => MessageKind::Unknown {
            msg_type: msg_type.clone(),
        },
    };

    let message = Message {
        target: text(&raw, "ToUserName"),
        source: text(&raw, "FromUserName"),
        time: integer(&raw, "CreateTime")?,
        id: optional(&raw, "MsgId"),
        kind,
        raw,
    };

    debug!(
        msg_type = %msg_type,
        source = %message.source,
        "werobot_message_parsed"
    );

    Ok(message)
}

fn parse_event(raw: &BTreeMap<String, String>) -> Result<EventKind, ParseError> {
    let name = required(raw, "Event")?.to_ascii_lowercase();
    let key = optional(raw, "EventKey");
    let ticket = optional(raw, "Ticket");

    let event = match name.as_str() {
        "subscribe" => EventKind::Subscribe {
            // QR-code follows prefix the scene key with "qrscene_"
            key: key.map(|k| k.strip_prefix("qrscene_").map(str::to_string).unwrap_or(k)),
            ticket,
        },
        "unsubscribe" => EventKind::Unsubscribe,
        "scan" => EventKind::Scan {
            key: key.unwrap_or_default(),
            ticket,
        },
        "location" => EventKind::Location {
            latitude: number(raw, "Latitude")?,
            longitude: number(raw, "Longitude")?,
            precision: number(raw, "Precision")?,
        },
        "click" => EventKind::Click {
            key: key.unwrap_or_default(),
        },
        "view" => EventKind::View {
            url: key.unwrap_or_default(),
        },
        _ => EventKind::Other { name, key },
    };
    Ok(event)
}

/// Collect the text of every element below the root, keyed by element name.
///
/// Nested containers are flattened; the innermost element names win.
/// Element text is kept verbatim; whitespace-only text between elements is
/// skipped.
fn parse_elements(xml: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let mut reader = Reader::from_str(xml);

    let mut values = BTreeMap::new();
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                saw_root = true;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if !stack.is_empty() {
                    values.entry(name.clone()).or_insert_with(String::new);
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                saw_root = true;
                if !stack.is_empty() {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    values.entry(name).or_insert_with(String::new);
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(e) if stack.len() >= 2 => {
                let value = e.unescape()?;
                if !value.trim().is_empty() {
                    append(&mut values, &stack, &value);
                }
            }
            Event::CData(e) if stack.len() >= 2 => {
                let bytes = e.into_inner();
                let value = std::str::from_utf8(&bytes)?;
                append(&mut values, &stack, value);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(ParseError::Empty);
    }
    if let Some(open) = stack.last() {
        return Err(ParseError::Unclosed(open.clone()));
    }
    Ok(values)
}

fn append(values: &mut BTreeMap<String, String>, stack: &[String], value: &str) {
    if let Some(name) = stack.last() {
        values.entry(name.clone()).or_default().push_str(value);
    }
}

fn required<'a>(raw: &'a BTreeMap<String, String>, field: &'static str) -> Result<&'a str, ParseError> {
    raw.get(field)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(ParseError::MissingField(field))
}

fn optional(raw: &BTreeMap<String, String>, field: &str) -> Option<String> {
    raw.get(field).filter(|v| !v.is_empty()).cloned()
}

fn text(raw: &BTreeMap<String, String>, field: &str) -> String {
    raw.get(field).cloned().unwrap_or_default()
}

fn integer(raw: &BTreeMap<String, String>, field: &'static str) -> Result<i64, ParseError> {
    match raw.get(field).map(|v| v.trim()) {
        None | Some("") => Ok(0),
        Some(v) => v.parse().map_err(|_| ParseError::InvalidField {
            field,
            value: v.to_string(),
        }),
    }
}

fn number(raw: &BTreeMap<String, String>, field: &'static str) -> Result<f64, ParseError> {
    let value = required(raw, field)?;
    value.trim().parse().map_err(|_| ParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}
