//! Camera configuration parameters.
//!
//! These are the user-facing acquisition settings staged onto a camera
//! before it is armed: exposure time, trigger routing, and the sensor
//! region of interest. The vocabulary follows the pco-family bindings
//! (four trigger modes, two polarities, 1-based inclusive ROI), but the
//! types here are hardware-agnostic; each binding translates them to its
//! own wire encodings.

use serde::{Deserialize, Serialize};

/// Trigger mode for frame acquisition. Closed enumeration; bindings reject
/// modes their hardware does not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Free-running: acquire as soon as the sensor is ready.
    Auto,
    /// Software trigger issued by the host.
    Software,
    /// External trigger edge starts each exposure.
    External,
    /// External pulse gates the exposure (pulse width = integration time).
    ExternalExposure,
}

impl TriggerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::Auto => "auto",
            TriggerMode::Software => "software",
            TriggerMode::External => "external",
            TriggerMode::ExternalExposure => "external_exposure",
        }
    }
}

/// Polarity of the hardware trigger input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolarity {
    Rising,
    Falling,
}

/// Region of interest for hardware cropping, 1-based inclusive pixel
/// coordinates as the pco bindings express it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Roi {
    /// Full-sensor ROI for a sensor of the given dimensions.
    pub fn full_sensor(width: u32, height: u32) -> Self {
        Self {
            left: 1,
            top: 1,
            right: width,
            bottom: height,
        }
    }

    /// Width in pixels. Zero if the ROI is degenerate.
    pub fn width(&self) -> u32 {
        (self.right + 1).saturating_sub(self.left)
    }

    /// Height in pixels. Zero if the ROI is degenerate.
    pub fn height(&self) -> u32 {
        (self.bottom + 1).saturating_sub(self.top)
    }

    /// True if the ROI is non-degenerate and lies within a sensor of the
    /// given dimensions.
    pub fn fits_sensor(&self, width: u32, height: u32) -> bool {
        self.left >= 1
            && self.top >= 1
            && self.left <= self.right
            && self.top <= self.bottom
            && self.right <= width
            && self.bottom <= height
    }
}

/// Acquisition settings staged onto a camera before arming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Integration time in microseconds.
    pub exposure_us: u32,
    /// Trigger mode.
    pub trigger: TriggerMode,
    /// Trigger input polarity.
    #[serde(default = "default_polarity")]
    pub polarity: TriggerPolarity,
    /// Hardware crop region. `None` means full sensor.
    #[serde(default)]
    pub roi: Option<Roi>,
}

fn default_polarity() -> TriggerPolarity {
    TriggerPolarity::Rising
}

impl Default for CameraConfig {
    /// Externally triggered, 10ms exposure, full sensor. Used for disabled
    /// epochs, where the configuration is never pushed to hardware.
    fn default() -> Self {
        Self {
            exposure_us: 10_000,
            trigger: TriggerMode::External,
            polarity: TriggerPolarity::Rising,
            roi: None,
        }
    }
}
