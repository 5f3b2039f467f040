//! pco.edge wire encodings.
//!
//! The SC2 SDK expresses trigger routing as small integers; everything
//! above the binding speaks the named enumerations from `cam-core`, and
//! this module is the single place the raw codes live.

use cam_core::{TriggerMode, TriggerPolarity};

/// Sensor geometry of the pco.edge 4.2.
pub const SENSOR_WIDTH: u32 = 2048;
pub const SENSOR_HEIGHT: u32 = 2048;
pub const BIT_DEPTH: u16 = 16;

/// Exposure limits of the pco.edge 4.2 (100 us to 10 s).
pub const MIN_EXPOSURE_US: u32 = 100;
pub const MAX_EXPOSURE_US: u32 = 10_000_000;

/// `PCO_AddBufferEx` accepts at most 16 outstanding buffers.
pub const MAX_BUFFERS: usize = 16;

/// `PCO_SetTriggerMode` code for a trigger mode.
pub fn trigger_mode_code(mode: TriggerMode) -> u16 {
    match mode {
        TriggerMode::Auto => 0,
        TriggerMode::Software => 1,
        TriggerMode::External => 2,
        TriggerMode::ExternalExposure => 3,
    }
}

/// `PCO_SetHWIOSignal` polarity code for a trigger input.
pub fn trigger_polarity_code(polarity: TriggerPolarity) -> u16 {
    match polarity {
        TriggerPolarity::Rising => 4,
        TriggerPolarity::Falling => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_codes() {
        assert_eq!(trigger_mode_code(TriggerMode::Auto), 0);
        assert_eq!(trigger_mode_code(TriggerMode::Software), 1);
        assert_eq!(trigger_mode_code(TriggerMode::External), 2);
        assert_eq!(trigger_mode_code(TriggerMode::ExternalExposure), 3);
        assert_eq!(trigger_polarity_code(TriggerPolarity::Rising), 4);
        assert_eq!(trigger_polarity_code(TriggerPolarity::Falling), 8);
    }
}
