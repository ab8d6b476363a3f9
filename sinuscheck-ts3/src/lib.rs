pub mod client;
pub mod error;
pub mod models;
pub mod reply;

pub use client::Ts3QueryClient;
pub use error::{Ts3Error, Result};
pub use models::*;
