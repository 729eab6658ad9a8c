pub mod cadence;
pub mod observation;

pub use cadence::*;
pub use observation::*;
