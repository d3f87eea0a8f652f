//! Hand-rolled framed wire protocol.
//!
//! Every client command is one opcode byte, optionally followed by a
//! single payload: a big-endian u32 (item index) or a length-prefixed
//! UTF-8 string (u32-BE byte length, then the bytes). Server-to-client
//! strings (map blocks, snapshots, the avatar roster) use the same
//! length-prefixed encoding.

use thiserror::Error;

pub const OP_FORWARD: u8 = 0x01;
pub const OP_BACK: u8 = 0x02;
pub const OP_STRAFE_LEFT: u8 = 0x03;
pub const OP_STRAFE_RIGHT: u8 = 0x04;
pub const OP_TURN_LEFT: u8 = 0x05;
pub const OP_TURN_RIGHT: u8 = 0x06;
pub const OP_TRANSIT: u8 = 0x07;
pub const OP_USE_ITEM: u8 = 0x08;
pub const OP_DESTROY_ITEM: u8 = 0x09;
pub const OP_PUT_ITEM: u8 = 0x0A;
pub const OP_TAKE_ITEMS: u8 = 0x0B;
pub const OP_UNLOCK: u8 = 0x0C;
pub const OP_SAVE: u8 = 0x0D;
pub const OP_LOAD: u8 = 0x0E;
pub const OP_CHAT: u8 = 0x0F;
pub const OP_DISCONNECT: u8 = 0x10;
pub const OP_READY: u8 = 0x11;

/// One decoded client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Forward,
    Back,
    StrafeLeft,
    StrafeRight,
    TurnLeft,
    TurnRight,
    Transit,
    UseItem(u32),
    DestroyItem(u32),
    PutItem(u32),
    TakeItems,
    Unlock,
    Save,
    Load,
    Chat(String),
    Disconnect,
    Ready,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),
    #[error("truncated frame")]
    Truncated,
    #[error("string payload is not valid UTF-8")]
    BadUtf8,
}

impl Command {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Forward => OP_FORWARD,
            Command::Back => OP_BACK,
            Command::StrafeLeft => OP_STRAFE_LEFT,
            Command::StrafeRight => OP_STRAFE_RIGHT,
            Command::TurnLeft => OP_TURN_LEFT,
            Command::TurnRight => OP_TURN_RIGHT,
            Command::Transit => OP_TRANSIT,
            Command::UseItem(_) => OP_USE_ITEM,
            Command::DestroyItem(_) => OP_DESTROY_ITEM,
            Command::PutItem(_) => OP_PUT_ITEM,
            Command::TakeItems => OP_TAKE_ITEMS,
            Command::Unlock => OP_UNLOCK,
            Command::Save => OP_SAVE,
            Command::Load => OP_LOAD,
            Command::Chat(_) => OP_CHAT,
            Command::Disconnect => OP_DISCONNECT,
            Command::Ready => OP_READY,
        }
    }

    /// Serializes the command into its wire frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![self.opcode()];
        match self {
            Command::UseItem(index) | Command::DestroyItem(index) | Command::PutItem(index) => {
                buf.extend_from_slice(&index.to_be_bytes());
            }
            Command::Chat(text) => {
                buf.extend_from_slice(&(text.len() as u32).to_be_bytes());
                buf.extend_from_slice(text.as_bytes());
            }
            _ => {}
        }
        buf
    }

    /// Decodes one frame from the front of `buf`, returning the command
    /// and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Command, usize), ProtocolError> {
        let opcode = *buf.first().ok_or(ProtocolError::Truncated)?;
        match opcode {
            OP_FORWARD => Ok((Command::Forward, 1)),
            OP_BACK => Ok((Command::Back, 1)),
            OP_STRAFE_LEFT => Ok((Command::StrafeLeft, 1)),
            OP_STRAFE_RIGHT => Ok((Command::StrafeRight, 1)),
            OP_TURN_LEFT => Ok((Command::TurnLeft, 1)),
            OP_TURN_RIGHT => Ok((Command::TurnRight, 1)),
            OP_TRANSIT => Ok((Command::Transit, 1)),
            OP_TAKE_ITEMS => Ok((Command::TakeItems, 1)),
            OP_UNLOCK => Ok((Command::Unlock, 1)),
            OP_SAVE => Ok((Command::Save, 1)),
            OP_LOAD => Ok((Command::Load, 1)),
            OP_DISCONNECT => Ok((Command::Disconnect, 1)),
            OP_READY => Ok((Command::Ready, 1)),
            OP_USE_ITEM | OP_DESTROY_ITEM | OP_PUT_ITEM => {
                let index = read_u32(&buf[1..])?;
                let cmd = match opcode {
                    OP_USE_ITEM => Command::UseItem(index),
                    OP_DESTROY_ITEM => Command::DestroyItem(index),
                    _ => Command::PutItem(index),
                };
                Ok((cmd, 5))
            }
            OP_CHAT => {
                let len = read_u32(&buf[1..])? as usize;
                let bytes = buf.get(5..5 + len).ok_or(ProtocolError::Truncated)?;
                let text =
                    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::BadUtf8)?;
                Ok((Command::Chat(text), 5 + len))
            }
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

fn read_u32(buf: &[u8]) -> Result<u32, ProtocolError> {
    let bytes: [u8; 4] = buf
        .get(..4)
        .ok_or(ProtocolError::Truncated)?
        .try_into()
        .expect("slice is four bytes");
    Ok(u32::from_be_bytes(bytes))
}

/// Encodes a length-prefixed string frame.
pub fn encode_string(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + text.len());
    buf.extend_from_slice(&(text.len() as u32).to_be_bytes());
    buf.extend_from_slice(text.as_bytes());
    buf
}

/// Decodes a length-prefixed string frame, returning the string and
/// bytes consumed.
pub fn decode_string(buf: &[u8]) -> Result<(String, usize), ProtocolError> {
    let len = read_u32(buf)? as usize;
    let bytes = buf.get(4..4 + len).ok_or(ProtocolError::Truncated)?;
    let text = String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::BadUtf8)?;
    Ok((text, 4 + len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_commands_roundtrip() {
        let commands = [
            Command::Forward,
            Command::Back,
            Command::StrafeLeft,
            Command::StrafeRight,
            Command::TurnLeft,
            Command::TurnRight,
            Command::Transit,
            Command::TakeItems,
            Command::Unlock,
            Command::Save,
            Command::Load,
            Command::Disconnect,
            Command::Ready,
        ];
        for cmd in commands {
            let frame = cmd.encode();
            assert_eq!(frame.len(), 1);
            assert_eq!(Command::decode(&frame), Ok((cmd, 1)));
        }
    }

    #[test]
    fn test_indexed_commands_roundtrip() {
        for cmd in [
            Command::UseItem(0),
            Command::DestroyItem(3),
            Command::PutItem(u32::MAX),
        ] {
            let frame = cmd.encode();
            assert_eq!(frame.len(), 5);
            assert_eq!(Command::decode(&frame), Ok((cmd, 5)));
        }
    }

    #[test]
    fn test_chat_roundtrip() {
        let cmd = Command::Chat("the cupboard is locked".to_string());
        let frame = cmd.encode();
        assert_eq!(Command::decode(&frame), Ok((cmd, frame.len())));
    }

    #[test]
    fn test_unknown_opcode_is_protocol_error() {
        assert_eq!(
            Command::decode(&[0x7F]),
            Err(ProtocolError::UnknownOpcode(0x7F))
        );
        assert_eq!(Command::decode(&[0x00]), Err(ProtocolError::UnknownOpcode(0)));
    }

    #[test]
    fn test_truncated_frames() {
        assert_eq!(Command::decode(&[]), Err(ProtocolError::Truncated));
        assert_eq!(
            Command::decode(&[OP_USE_ITEM, 0, 0]),
            Err(ProtocolError::Truncated)
        );
        assert_eq!(
            Command::decode(&[OP_CHAT, 0, 0, 0, 9, b'h', b'i']),
            Err(ProtocolError::Truncated)
        );
    }

    #[test]
    fn test_string_frame_roundtrip() {
        let frame = encode_string("0,4,3,clearing\n....\n....\n....\n");
        let (text, used) = decode_string(&frame).unwrap();
        assert_eq!(text, "0,4,3,clearing\n....\n....\n....\n");
        assert_eq!(used, frame.len());
    }

    #[test]
    fn test_empty_string_is_four_byte_frame() {
        let frame = encode_string("");
        assert_eq!(frame, vec![0, 0, 0, 0]);
        assert_eq!(decode_string(&frame), Ok((String::new(), 4)));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut frame = Command::Transit.encode();
        frame.extend_from_slice(&Command::Unlock.encode());
        let (cmd, used) = Command::decode(&frame).unwrap();
        assert_eq!(cmd, Command::Transit);
        assert_eq!(Command::decode(&frame[used..]), Ok((Command::Unlock, 1)));
    }
}
