pub mod call;
pub mod config;
pub mod request;

/// Number of floors served by every car in the fleet. The fleet is
/// homogeneous; peers with a different floor count are not supported.
pub const NUM_FLOORS: usize = 4;
