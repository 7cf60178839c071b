pub mod chain;
pub mod delay_line;
pub mod detector;
pub mod meter;
pub mod params;
pub mod stages;

pub use chain::{AggressorChain, ChainHandle};
pub use detector::Features;
pub use meter::MeterInfo;
pub use params::RackParams;
