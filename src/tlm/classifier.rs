//! # Frame Classifier
//!
//! Slices one frame out of the file image and decides what it is.
//!
//! The stride of a frame depends only on its leading marker word and the
//! configured [`FrameLayout`]. The type tag is read after the frame has been
//! sliced, so a corrupt tag can mislabel a frame but never shift the
//! boundaries of the frames that follow it.

use crate::config::FrameLayout;
use crate::tlm::protocol::{TLM_HEADER_SUBTYPE_OFFSET, TLM_HEADER_TYPE_OFFSET, TLM_MARKER_SIZE};
use crate::tlm::reader::{ByteOrder, ByteReader};

/// What a frame contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Start of a logging session
    MainHeader,
    /// Sensor declaration
    SupplementalHeader,
    /// Sensor reading with the given type tag
    Data(u8),
}

/// One frame borrowed from the file image
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    /// Byte offset of the frame in the file
    pub offset: usize,
    /// Exactly one stride of bytes
    pub bytes: &'a [u8],
    pub kind: FrameKind,
}

impl<'a> RawFrame<'a> {
    /// Frame bytes after the marker / timestamp word
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[TLM_MARKER_SIZE..]
    }
}

/// The file ends before the frame at `offset` is complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated {
    pub offset: usize,
    /// Bytes left in the file from `offset`
    pub available: usize,
    /// Bytes the frame needs
    pub expected: usize,
}

/// Classify the frame starting at `offset`
///
/// # Arguments
///
/// * `bytes` - Whole file image
/// * `offset` - Frame boundary to read from
/// * `layout` - Validated frame layout
///
/// # Returns
///
/// * `Result<RawFrame, Truncated>` - The frame, or the shortfall if the file
///   ends inside it
pub fn classify<'a>(
    bytes: &'a [u8],
    offset: usize,
    layout: &FrameLayout,
) -> Result<RawFrame<'a>, Truncated> {
    let rest = bytes.get(offset..).unwrap_or_default();

    let marker = match ByteReader::new(rest).read_u32(ByteOrder::Little) {
        Ok(marker) => marker,
        Err(_) => {
            return Err(Truncated {
                offset,
                available: rest.len(),
                expected: layout.data_frame_size.min(layout.header_frame_size),
            })
        }
    };

    let stride = layout.stride(marker);
    let Some(frame) = rest.get(..stride) else {
        return Err(Truncated {
            offset,
            available: rest.len(),
            expected: stride,
        });
    };

    let type_byte = frame.get(TLM_HEADER_TYPE_OFFSET).copied().unwrap_or_default();
    let kind = if marker == layout.header_marker {
        let subtype_byte = frame.get(TLM_HEADER_SUBTYPE_OFFSET).copied().unwrap_or_default();
        if type_byte != subtype_byte && frame.contains(&layout.main_header_signature) {
            FrameKind::MainHeader
        } else {
            FrameKind::SupplementalHeader
        }
    } else {
        FrameKind::Data(type_byte)
    };

    Ok(RawFrame {
        offset,
        bytes: frame,
        kind,
    })
}
