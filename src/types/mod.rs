pub mod location;
pub mod observation;
pub mod partition;
