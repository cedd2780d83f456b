pub mod agreement;
pub mod crop;
pub mod delivery;
pub mod errors;
pub mod events;
pub mod location;
pub mod order;
pub mod payment;
pub mod ports;
