pub mod bluetooth;
pub mod link_reset;
pub mod logging;
pub mod resilience;
