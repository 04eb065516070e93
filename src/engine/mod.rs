pub mod aggregate;
pub mod calculator;
pub mod factors;

pub use aggregate::aggregate;
pub use calculator::EmissionsCalculator;
pub use factors::{default_subtype, FactorCatalog, DEFAULT_FLIGHT_SUBTYPE};
