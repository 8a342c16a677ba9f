//! netif-exporter: network interface change exporter
//!
//! A library for sampling the host's network interfaces, detecting
//! address, state and MTU changes between samples, and exporting them
//! as Prometheus metrics.

pub mod config;
pub mod metrics;
pub mod monitor;
pub mod network;
pub mod server;
pub mod state;
pub mod time;
