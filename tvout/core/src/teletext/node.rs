use alloc::boxed::Box;
use bytemuck::{Pod, Zeroable};
use heapless::Vec;

use crate::hw::DmaDescriptor;
use crate::mode::FieldParity;

use super::TeletextError;

pub const TELETEXT_LINE_BYTES: usize = 48;

pub const FIRST_VBI_LINE: u32 = 6;
pub const LAST_VBI_LINE: u32 = 22;
pub const MAX_TELETEXT_LINES: usize = (LAST_VBI_LINE - FIRST_VBI_LINE + 1) as usize;
/// Bit `n` set selects VBI line `n`.
pub const VBI_LINE_MASK: u32 = ((1 << (LAST_VBI_LINE + 1)) - 1) & !((1 << FIRST_VBI_LINE) - 1);

/// One teletext packet as the encoder's data register expects it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct TeletextLine {
    pub data: [u8; TELETEXT_LINE_BYTES],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TargetField {
    Top,
    Bottom,
    Any,
}

impl TargetField {
    pub fn matches(self, parity: FieldParity) -> bool {
        match self {
            TargetField::Any => true,
            TargetField::Top => parity == FieldParity::Top,
            TargetField::Bottom => parity == FieldParity::Bottom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeletextMetadata {
    pub field: TargetField,
    /// Earliest time to present, in the same clock as [`super::FieldTick::now_us`].
    /// `None` goes out on the next matching field.
    pub presentation_time_us: Option<u64>,
    pub valid_line_mask: u32,
    /// One packet per set bit of `valid_line_mask`, lowest line first.
    pub lines: Box<[TeletextLine]>,
}

impl TeletextMetadata {
    /// Splits a buffer of back to back 48 byte packets.
    pub fn from_packets(
        field: TargetField,
        presentation_time_us: Option<u64>,
        valid_line_mask: u32,
        packets: &[u8],
    ) -> Result<Self, TeletextError> {
        let lines: &[TeletextLine] = bytemuck::try_cast_slice(packets).map_err(|_| TeletextError::PacketSize(packets.len()))?;
        let metadata = Self {
            field,
            presentation_time_us,
            valid_line_mask,
            lines: lines.into(),
        };
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn validate(&self) -> Result<(), TeletextError> {
        if self.valid_line_mask == 0 || self.valid_line_mask & !VBI_LINE_MASK != 0 {
            return Err(TeletextError::InvalidLineMask(self.valid_line_mask));
        }
        let expected = self.valid_line_mask.count_ones() as usize;
        if self.lines.len() != expected {
            return Err(TeletextError::LineCount { expected, got: self.lines.len() });
        }
        Ok(())
    }
}

/// A queued entry: the caller's metadata plus its DMA transfer.
pub(crate) struct TeletextNode<X> {
    pub index: usize,
    pub metadata: TeletextMetadata,
    pub transfer: X,
}

/// One descriptor per line, each copying a packet into the data register.
pub(crate) fn line_descriptors(
    metadata: &TeletextMetadata,
    data_register: usize,
) -> Result<Vec<DmaDescriptor, MAX_TELETEXT_LINES>, TeletextError> {
    let mut descriptors = Vec::new();
    for line in metadata.lines.iter() {
        let bytes = bytemuck::bytes_of(line);
        descriptors
            .push(DmaDescriptor {
                src: bytes.as_ptr() as usize,
                dst: data_register,
                len: bytes.len(),
            })
            .map_err(|_| TeletextError::LineCount { expected: MAX_TELETEXT_LINES, got: metadata.lines.len() })?;
    }
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn vbi_mask_covers_lines_6_to_22() {
        assert_eq!(VBI_LINE_MASK, 0x007F_FFC0);
        assert_eq!(MAX_TELETEXT_LINES, 17);
    }

    #[test]
    fn packets_split_into_lines() {
        let mut packets = vec![0u8; 2 * TELETEXT_LINE_BYTES];
        packets[TELETEXT_LINE_BYTES] = 0x55;
        let meta = TeletextMetadata::from_packets(TargetField::Any, None, (1 << 7) | (1 << 8), &packets).unwrap();

        assert_eq!(meta.lines.len(), 2);
        assert_eq!(meta.lines[1].data[0], 0x55);

        let descriptors = line_descriptors(&meta, 0x1000).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert!(descriptors.iter().all(|d| d.dst == 0x1000 && d.len == TELETEXT_LINE_BYTES));
        assert_eq!(descriptors[1].src - descriptors[0].src, TELETEXT_LINE_BYTES);
    }

    #[test]
    fn rejects_bad_metadata() {
        let packets = [0u8; TELETEXT_LINE_BYTES];
        assert_eq!(
            TeletextMetadata::from_packets(TargetField::Top, None, 1 << 5, &packets),
            Err(TeletextError::InvalidLineMask(1 << 5))
        );
        assert_eq!(
            TeletextMetadata::from_packets(TargetField::Top, None, 0b11 << 6, &packets),
            Err(TeletextError::LineCount { expected: 2, got: 1 })
        );
        assert_eq!(
            TeletextMetadata::from_packets(TargetField::Top, None, 1 << 6, &packets[..40]),
            Err(TeletextError::PacketSize(40))
        );
    }

    #[test]
    fn field_matching() {
        assert!(TargetField::Any.matches(FieldParity::Bottom));
        assert!(TargetField::Top.matches(FieldParity::Top));
        assert!(!TargetField::Top.matches(FieldParity::Bottom));
    }
}
