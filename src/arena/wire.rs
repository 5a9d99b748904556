//! Arena wire codecs
//!
//! The translators and generator backing the demo arena: a probe operation,
//! a movement operation, and the position status sent back to peers.

use std::any::Any;

use crate::protocol::{
    CodecError, CodecResult, Generator, Payload, Translator, WireReader, WireWriter,
};

use super::{Direction, Player};

/// Probe operation: payload is one big-endian u32 token
pub const OP_PROBE: u32 = 0;

/// Movement operation: payload is a `Direction` as two big-endian f32
pub const OP_MOVE: u32 = 1;

/// Position status: a `Player` as two big-endian f32
pub const STATUS_POSITION: u32 = 1;

/// Decodes probe operations
pub struct ProbeTranslator;

impl Translator for ProbeTranslator {
    fn op_type(&self) -> u32 {
        OP_PROBE
    }

    fn translate(&self, data: &[u8]) -> CodecResult<(usize, Payload)> {
        let mut reader = WireReader::new(data);
        let token = reader.read_u32()?;
        Ok((reader.position(), Box::new(token)))
    }
}

/// Decodes movement operations
pub struct MoveTranslator;

impl Translator for MoveTranslator {
    fn op_type(&self) -> u32 {
        OP_MOVE
    }

    fn translate(&self, data: &[u8]) -> CodecResult<(usize, Payload)> {
        let mut reader = WireReader::new(data);
        let direction = Direction {
            x: reader.read_f32()?,
            y: reader.read_f32()?,
        };
        Ok((reader.position(), Box::new(direction)))
    }
}

/// Encodes position statuses
pub struct PositionGenerator;

impl Generator for PositionGenerator {
    fn status_type(&self) -> u32 {
        STATUS_POSITION
    }

    fn generate(&self, value: &(dyn Any + Send + Sync)) -> CodecResult<Vec<u8>> {
        let player = value.downcast_ref::<Player>().ok_or_else(|| {
            CodecError::Malformed("position status expects a Player value".to_string())
        })?;

        let mut writer = WireWriter::with_capacity(8);
        writer.write_f32(player.x);
        writer.write_f32(player.y);
        Ok(writer.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_translate() {
        let data = [0x00, 0x00, 0x01, 0x02, 0xFF];
        let (consumed, value) = ProbeTranslator.translate(&data).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(*value.downcast_ref::<u32>().unwrap(), 0x0102);
    }

    #[test]
    fn test_move_translate() {
        // 2.0f32 and 3.0f32 big-endian
        let data = [0x40, 0x00, 0x00, 0x00, 0x40, 0x40, 0x00, 0x00];
        let (consumed, value) = MoveTranslator.translate(&data).unwrap();
        assert_eq!(consumed, 8);
        let direction = value.downcast_ref::<Direction>().unwrap();
        assert_eq!(direction.x, 2.0);
        assert_eq!(direction.y, 3.0);
    }

    #[test]
    fn test_move_translate_short_payload() {
        let data = [0x40, 0x00, 0x00, 0x00, 0x40];
        assert!(MoveTranslator.translate(&data).is_err());
    }

    #[test]
    fn test_position_generate() {
        let player = Player { x: 2.0, y: 3.0 };
        let bytes = PositionGenerator.generate(&player).unwrap();
        assert_eq!(
            bytes,
            vec![0x40, 0x00, 0x00, 0x00, 0x40, 0x40, 0x00, 0x00]
        );
    }

    #[test]
    fn test_position_generate_wrong_type() {
        assert!(PositionGenerator.generate(&7u32).is_err());
    }

    #[test]
    fn test_move_position_roundtrip() {
        let player = Player { x: -1.5, y: 0.25 };
        let bytes = PositionGenerator.generate(&player).unwrap();
        let (_, value) = MoveTranslator.translate(&bytes).unwrap();
        let direction = value.downcast_ref::<Direction>().unwrap();
        assert_eq!(direction.x, player.x);
        assert_eq!(direction.y, player.y);
    }
}
