mod display;
mod ring;

pub use display::*;
pub use ring::BoundedLog;
