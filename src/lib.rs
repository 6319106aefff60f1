pub mod bus;
pub mod config;
pub mod history;
pub mod mux;
pub mod scheduler;
pub mod sensor;
pub mod snapshot;
pub mod sweep;

#[cfg(test)]
mod testing;
