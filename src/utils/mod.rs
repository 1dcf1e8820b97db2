pub mod screenshot;
pub mod text;
