pub mod config;
pub mod error;
pub mod io;
pub mod math;
pub mod mesh;
pub mod pipeline;
pub mod process;
pub mod scene;
pub mod solver;

pub use error::{DecompError, Result};
