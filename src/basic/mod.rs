pub mod balance;
pub mod config;
pub(crate) mod dsbus_dv;
pub mod error;
pub mod network;
pub(crate) mod newtonpf;
pub mod powerflow;
pub mod results;
pub mod solver;
pub mod system;
pub(crate) mod units;
