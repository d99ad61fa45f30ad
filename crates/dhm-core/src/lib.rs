pub mod apodize;
pub mod batch;
pub mod config;
pub mod consts;
pub mod error;
pub mod fft;
pub mod filter;
pub mod io;
pub mod propagate;
pub mod reconstruct;
pub mod state;
pub mod unwrap;
