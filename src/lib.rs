pub mod calibration;
pub mod config;
pub mod dashboard;
pub mod drivers;
pub mod engine;
pub mod gui;
pub mod pubsub;
pub mod recorder;
pub mod relay;
pub mod schedule;
pub mod session;
pub mod shaping;
pub mod types;
