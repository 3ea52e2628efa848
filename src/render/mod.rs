pub mod canvas;
pub mod commands;
pub mod renderer;
pub mod settings;
pub mod text;
