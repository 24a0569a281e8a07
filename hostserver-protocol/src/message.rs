//! Host messages returned alongside failing replies.
//!
//! A message list code point holds a chain of message code points. Every message is itself a
//! chain of small code points, one per field, so optional fields can simply be left out.
use std::fmt::Display;

use crate::binary::read_u16;
use crate::ccsid::CharConverter;
use crate::codepoint::{CodePoint, encode_chain};
use crate::error::ReadError;
use crate::template::{CP_MESSAGE, CP_MESSAGE_LIST};

const FIELD_ID: u16 = 0x0001;
const FIELD_TEXT: u16 = 0x0002;
const FIELD_HELP: u16 = 0x0003;
const FIELD_SEVERITY: u16 = 0x0004;
const FIELD_SUBSTITUTION: u16 = 0x0005;

/// A message issued by the host, such as `CPF9801`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HostMessage {
    pub id: String,
    pub text: String,
    pub help: String,
    pub severity: u16,
    /// Raw replacement data of the message, in the host encoding.
    pub substitution_data: Vec<u8>,
}

impl HostMessage {
    pub fn new(id: impl Into<String>, text: impl Into<String>, severity: u16) -> HostMessage {
        HostMessage {
            id: id.into(),
            text: text.into(),
            severity,
            ..HostMessage::default()
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> HostMessage {
        self.help = help.into();
        self
    }

    pub fn to_code_point(&self, converter: &dyn CharConverter) -> Result<CodePoint, ReadError> {
        let fields = [
            CodePoint::new(FIELD_ID, converter.to_bytes(&self.id)?),
            CodePoint::new(FIELD_TEXT, converter.to_bytes(&self.text)?),
            CodePoint::new(FIELD_HELP, converter.to_bytes(&self.help)?),
            CodePoint::new(FIELD_SEVERITY, self.severity.to_be_bytes().to_vec()),
            CodePoint::new(FIELD_SUBSTITUTION, self.substitution_data.clone()),
        ];
        Ok(CodePoint::new(CP_MESSAGE, encode_chain(&fields)))
    }

    pub fn from_code_point(
        code_point: &CodePoint,
        converter: &dyn CharConverter,
    ) -> Result<HostMessage, ReadError> {
        let mut message = HostMessage::default();
        for field in code_point.chain() {
            let field = field?;
            match field.id {
                FIELD_ID => message.id = converter.to_string(field.data)?,
                FIELD_TEXT => message.text = converter.to_string(field.data)?,
                FIELD_HELP => message.help = converter.to_string(field.data)?,
                FIELD_SEVERITY => message.severity = read_u16(field.data, 0, "message severity")?,
                FIELD_SUBSTITUTION => message.substitution_data = field.data.to_vec(),
                other => log::trace!("Ignoring message field 0x{:04X}", other),
            }
        }
        Ok(message)
    }
}

impl Display for HostMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} (severity {})", self.id, self.text, self.severity)
    }
}

/// Encodes messages into a message list code point.
pub fn encode_message_list(
    messages: &[HostMessage],
    converter: &dyn CharConverter,
) -> Result<CodePoint, ReadError> {
    let entries = messages
        .iter()
        .map(|m| m.to_code_point(converter))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CodePoint::new(CP_MESSAGE_LIST, encode_chain(&entries)))
}

pub fn decode_message_list(
    code_point: &CodePoint,
    converter: &dyn CharConverter,
) -> Result<Vec<HostMessage>, ReadError> {
    let mut messages = Vec::new();
    for entry in code_point.chain() {
        let entry = entry?;
        if entry.id == CP_MESSAGE {
            messages.push(HostMessage::from_code_point(
                &entry.to_code_point(),
                converter,
            )?);
        }
    }
    Ok(messages)
}
