pub mod iec61850_9_2;
pub mod network;
pub mod protection;
pub mod sim;

pub mod model;
pub mod publisher;
pub mod subscriber;
