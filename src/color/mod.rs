//! Color and spatial-audio helper math.

pub mod pan;
pub mod space;

pub use pan::{stereo_pan, vbap_5_1, vbap_7_1, SpeakerGains};
pub use space::{delta_e2000, xyz_to_lab, Lab, XyzColor, ACESCG_TO_XYZ, XYZ_TO_ACESCG};
