//! Shared hard limits to prevent unbounded allocations or payload growth.

use crate::error::CamError;

/// Maximum allowed frame payload in bytes (default: 100MB).
pub const MAX_FRAME_BYTES: usize = 100 * 1024 * 1024;
/// Maximum supported width/height for frames.
pub const MAX_FRAME_DIMENSION: u32 = 65_536;
/// Maximum number of hardware buffers a camera can be armed with.
///
/// Matches the pco-family `AddBuffer` ceiling; drivers may advertise a lower
/// value via their capabilities.
pub const MAX_BUFFER_COUNT: usize = 16;

/// Validated frame sizing information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub pixels: usize,
    pub bytes: usize,
}

/// Validate frame dimensions and calculate pixel/byte sizes safely.
pub fn validate_frame_size(
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Result<FrameSize, CamError> {
    if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
        return Err(CamError::FrameDimensionsTooLarge {
            width,
            height,
            max_dimension: MAX_FRAME_DIMENSION,
        });
    }

    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or(CamError::SizeOverflow {
            context: "frame pixel count",
        })?;

    let bytes = pixels
        .checked_mul(bytes_per_pixel)
        .ok_or(CamError::SizeOverflow {
            context: "frame byte size",
        })?;

    if bytes > MAX_FRAME_BYTES {
        return Err(CamError::FrameTooLarge {
            bytes,
            max_bytes: MAX_FRAME_BYTES,
        });
    }

    Ok(FrameSize { pixels, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_frame_size() {
        let size = validate_frame_size(2048, 2048, 2).unwrap();
        assert_eq!(size.pixels, 2048 * 2048);
        assert_eq!(size.bytes, 2048 * 2048 * 2);
    }

    #[test]
    fn test_dimension_limit() {
        let err = validate_frame_size(MAX_FRAME_DIMENSION + 1, 10, 2).unwrap_err();
        assert!(matches!(err, CamError::FrameDimensionsTooLarge { .. }));
    }

    #[test]
    fn test_byte_limit() {
        let err = validate_frame_size(65_536, 65_536, 2).unwrap_err();
        assert!(matches!(err, CamError::FrameTooLarge { .. }));
    }
}
