//! CoAP wire protocol implementation.
//! Handles message framing, option delta encoding and the method/status code tables.

use crate::error::{Result, TradfriError};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

pub const COAP_VERSION: u8 = 1;
pub const PAYLOAD_MARKER: u8 = 0xff;
pub const MAX_TOKEN_LEN: usize = 8;

pub const OPTION_URI_PATH: u16 = 11;

define_message_code! {
    /// Request methods (class 0).
    Method {
        Get = (0, 1, "GET"),
        Post = (0, 2, "POST"),
        Put = (0, 3, "PUT"),
        Delete = (0, 4, "DELETE"),
    }
}

define_message_code! {
    /// Response codes (classes 2, 4 and 5) plus the empty code used by bare ACKs.
    Status {
        Empty = (0, 0, "Empty"),
        Created = (2, 1, "Created"),
        Deleted = (2, 2, "Deleted"),
        Valid = (2, 3, "Valid"),
        Changed = (2, 4, "Changed"),
        Content = (2, 5, "Content"),
        BadRequest = (4, 0, "Bad Request"),
        Unauthorized = (4, 1, "Unauthorized"),
        BadOption = (4, 2, "Bad Option"),
        Forbidden = (4, 3, "Forbidden"),
        NotFound = (4, 4, "Not Found"),
        MethodNotAllowed = (4, 5, "Method Not Allowed"),
        NotAcceptable = (4, 6, "Not Acceptable"),
        PreconditionFailed = (4, 12, "Precondition Failed"),
        RequestEntityTooLarge = (4, 13, "Request Entity Too Large"),
        UnsupportedContentFormat = (4, 15, "Unsupported Content-Format"),
        InternalServerError = (5, 0, "Internal Server Error"),
        NotImplemented = (5, 1, "Not Implemented"),
        BadGateway = (5, 2, "Bad Gateway"),
        ServiceUnavailable = (5, 3, "Service Unavailable"),
        GatewayTimeout = (5, 4, "Gateway Timeout"),
        ProxyingNotSupported = (5, 5, "Proxying Not Supported"),
    }
}

impl Status {
    pub fn is_success(self) -> bool {
        self.class() == 2
    }
}

/// CoAP message type (2-bit field of the fixed header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Confirmable = 0,
    NonConfirmable = 1,
    Acknowledgement = 2,
    Reset = 3,
}

impl MessageType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageType::Confirmable,
            1 => MessageType::NonConfirmable,
            2 => MessageType::Acknowledgement,
            _ => MessageType::Reset,
        }
    }
}

/// A single option (number + opaque value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapOption {
    pub number: u16,
    pub value: Vec<u8>,
}

/// CoAP message structure
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub mtype: MessageType,
    /// Raw code byte; see [`Message::method`] and [`Message::status`]
    pub code: u8,
    /// 16-bit message id, also used as the transaction id by this client
    pub message_id: u16,
    pub token: Vec<u8>,
    pub options: Vec<CoapOption>,
    pub payload: Vec<u8>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            mtype: MessageType::Confirmable,
            code: 0,
            message_id: 0,
            token: Vec::new(),
            options: Vec::new(),
            payload: Vec::new(),
        }
    }
}

impl Message {
    /// Empty acknowledgement for a confirmable message.
    pub fn ack(message_id: u16) -> Self {
        Self {
            mtype: MessageType::Acknowledgement,
            message_id,
            ..Default::default()
        }
    }

    pub fn method(&self) -> Method {
        Method::from_code(self.code)
    }

    pub fn status(&self) -> Status {
        Status::from_code(self.code)
    }

    /// True for the 0.00 code carried by bare ACK/RST messages.
    pub fn is_empty(&self) -> bool {
        self.code == 0
    }

    /// Replaces all Uri-Path options with the segments of `path`.
    pub fn set_path(&mut self, path: &str) {
        self.options.retain(|o| o.number != OPTION_URI_PATH);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            self.options.push(CoapOption {
                number: OPTION_URI_PATH,
                value: segment.as_bytes().to_vec(),
            });
        }
    }

    pub fn path(&self) -> String {
        let mut path = String::new();
        for opt in self.options.iter().filter(|o| o.number == OPTION_URI_PATH) {
            path.push('/');
            path.push_str(&String::from_utf8_lossy(&opt.value));
        }
        path
    }

    /// The transaction id carried in a 2-byte token, if any.
    pub fn token_id(&self) -> Option<u16> {
        match self.token.as_slice() {
            [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }
}

/// An outgoing request before a transaction id has been assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn new<P: Into<String>>(method: Method, path: P, payload: Vec<u8>) -> Self {
        Self {
            method,
            path: path.into(),
            payload,
        }
    }

    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::new(Method::Get, path, Vec::new())
    }

    pub fn put<P: Into<String>>(path: P, payload: Vec<u8>) -> Self {
        Self::new(Method::Put, path, payload)
    }

    pub fn post<P: Into<String>>(path: P, payload: Vec<u8>) -> Self {
        Self::new(Method::Post, path, payload)
    }

    /// Builds the confirmable message for transaction `id`.
    ///
    /// The id is used both as message id and as a 2-byte token so that
    /// separate (non-piggybacked) responses can be matched too.
    pub fn to_message(&self, id: u16) -> Message {
        let mut msg = Message {
            mtype: MessageType::Confirmable,
            code: self.method.code(),
            message_id: id,
            token: id.to_be_bytes().to_vec(),
            payload: self.payload.clone(),
            ..Default::default()
        };
        msg.set_path(&self.path);
        msg
    }
}

fn split_option_value(value: usize) -> Result<(u8, Option<u8>, Option<u16>)> {
    match value {
        0..=12 => Ok((value as u8, None, None)),
        13..=268 => Ok((13, Some((value - 13) as u8), None)),
        269..=65804 => Ok((14, None, Some((value - 269) as u16))),
        _ => Err(TradfriError::InvalidMessage(format!(
            "Option field {} out of range",
            value
        ))),
    }
}

/// Pack a Message into binary data.
pub fn pack_message(msg: &Message) -> Result<Vec<u8>> {
    if msg.token.len() > MAX_TOKEN_LEN {
        return Err(TradfriError::InvalidMessage(format!(
            "Token too long ({} bytes)",
            msg.token.len()
        )));
    }

    let mut data = Vec::with_capacity(4 + msg.token.len() + msg.payload.len() + 32);
    data.write_u8((COAP_VERSION << 6) | ((msg.mtype as u8) << 4) | msg.token.len() as u8)?;
    data.write_u8(msg.code)?;
    data.write_u16::<BigEndian>(msg.message_id)?;
    data.extend_from_slice(&msg.token);

    // Options must appear in ascending number order; a stable sort keeps
    // repeated options (path segments) in their given order.
    let mut options: Vec<&CoapOption> = msg.options.iter().collect();
    options.sort_by_key(|o| o.number);

    let mut last = 0u16;
    for opt in options {
        let (delta, delta_ext8, delta_ext16) = split_option_value((opt.number - last) as usize)?;
        let (len, len_ext8, len_ext16) = split_option_value(opt.value.len())?;
        data.write_u8((delta << 4) | len)?;
        for (ext8, ext16) in [(delta_ext8, delta_ext16), (len_ext8, len_ext16)] {
            if let Some(b) = ext8 {
                data.write_u8(b)?;
            }
            if let Some(w) = ext16 {
                data.write_u16::<BigEndian>(w)?;
            }
        }
        data.extend_from_slice(&opt.value);
        last = opt.number;
    }

    if !msg.payload.is_empty() {
        data.write_u8(PAYLOAD_MARKER)?;
        data.extend_from_slice(&msg.payload);
    }

    Ok(data)
}

fn read_option_ext(cursor: &mut Cursor<&[u8]>, nibble: u8) -> Result<usize> {
    match nibble {
        0..=12 => Ok(nibble as usize),
        13 => Ok(cursor.read_u8()? as usize + 13),
        14 => Ok(cursor.read_u16::<BigEndian>()? as usize + 269),
        _ => Err(TradfriError::InvalidMessage("Reserved option nibble".into())),
    }
}

/// Unpack binary data into a Message structure.
pub fn unpack_message(data: &[u8]) -> Result<Message> {
    if data.len() < 4 {
        return Err(TradfriError::InvalidMessage("Header too short".into()));
    }

    let mut cursor = Cursor::new(data);
    let first = cursor.read_u8()?;
    if first >> 6 != COAP_VERSION {
        return Err(TradfriError::InvalidMessage(format!(
            "Unsupported version {}",
            first >> 6
        )));
    }
    let mtype = MessageType::from_bits(first >> 4);
    let tkl = (first & 0x0f) as usize;
    if tkl > MAX_TOKEN_LEN {
        return Err(TradfriError::InvalidMessage(format!(
            "Token length {} too large",
            tkl
        )));
    }
    let code = cursor.read_u8()?;
    let message_id = cursor.read_u16::<BigEndian>()?;

    let mut token = vec![0u8; tkl];
    cursor
        .read_exact(&mut token)
        .map_err(|_| TradfriError::InvalidMessage("Truncated token".into()))?;

    let mut options = Vec::new();
    let mut payload = Vec::new();
    let mut number = 0usize;

    while (cursor.position() as usize) < data.len() {
        let byte = cursor.read_u8()?;
        if byte == PAYLOAD_MARKER {
            let start = cursor.position() as usize;
            if start == data.len() {
                return Err(TradfriError::InvalidMessage(
                    "Payload marker without payload".into(),
                ));
            }
            payload = data[start..].to_vec();
            break;
        }

        let delta = read_option_ext(&mut cursor, byte >> 4)
            .map_err(|_| TradfriError::InvalidMessage("Truncated option delta".into()))?;
        let len = read_option_ext(&mut cursor, byte & 0x0f)
            .map_err(|_| TradfriError::InvalidMessage("Truncated option length".into()))?;

        number += delta;
        if number > u16::MAX as usize {
            return Err(TradfriError::InvalidMessage("Option number overflow".into()));
        }

        let start = cursor.position() as usize;
        let end = start + len;
        if end > data.len() {
            return Err(TradfriError::InvalidMessage("Truncated option value".into()));
        }
        options.push(CoapOption {
            number: number as u16,
            value: data[start..end].to_vec(),
        });
        cursor.set_position(end as u64);
    }

    Ok(Message {
        mtype,
        code,
        message_id,
        token,
        options,
        payload,
    })
}
