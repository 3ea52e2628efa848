pub mod axis;
pub mod segments;
