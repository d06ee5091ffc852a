mod config;
mod hub;
mod util;

pub use config::*;
pub use hub::*;
pub use util::*;
