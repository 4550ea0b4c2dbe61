pub mod partition;
pub mod status;
pub mod worker;
