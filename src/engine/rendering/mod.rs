pub mod device;
pub mod glow_backend;
pub mod headless;
pub mod program;

pub use device::*;
pub use glow_backend::{GlShaderProgram, GlowDevice};
pub use headless::{DeviceCounters, HeadlessDevice, HeadlessProgram, UniformValue};
pub use program::*;
