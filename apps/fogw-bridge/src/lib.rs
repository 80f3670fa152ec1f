pub mod acquisition;
pub mod cli;
pub mod config;
pub mod decode;
pub mod driver;
pub mod error;
pub mod fields;
pub mod normalize;
pub mod record;
pub mod transport;
pub mod units;

#[cfg(test)]
pub mod test_support;

pub use acquisition::{AcquisitionEvent, AcquisitionStats};
pub use config::Config;
pub use driver::{loader, FoGwDriver, RecordStream};
pub use error::{CycleError, DecodeError, FetchError, HardFailure};
pub use record::{MeasurementRecord, Quantity};
pub use units::UnitSystem;
