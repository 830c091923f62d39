//! Mesh exchange with the solvers: triangulated OBJ input, hull output parsing.

mod parse;
mod serialize;
mod triangulate;

pub use parse::ParseHulls;
pub use serialize::{read_obj, WriteObj};
pub use triangulate::triangulate_polygon;
