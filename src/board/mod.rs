mod board;
mod coord;
mod fleet;
mod ship;

pub use board::*;
pub use coord::*;
pub use fleet::*;
pub use ship::*;
