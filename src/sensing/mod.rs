//! Signal samplers: periodic low-level probes that each yield a normalized
//! reading in `[0, 1]`, degrading to "unavailable" instead of failing.

pub mod board;
pub mod capture;
pub mod controller;
pub mod input;
pub mod loop_worker;
pub mod signal;
pub mod system;
pub mod window;

pub use board::SampleBoard;
pub use controller::{platform_samplers, SensingController};
pub use input::InputActivity;
pub use signal::{Sampler, SignalName, SignalSample, NEUTRAL_VALUE};
pub use window::{ActiveApp, ActiveWindow};
