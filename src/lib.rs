pub mod api;
pub mod board;
pub mod config;
pub mod controller;
pub mod error;
pub mod gpio;
pub mod motor;
pub mod runtime;
pub mod sensor;
pub mod signal;
pub mod state;
