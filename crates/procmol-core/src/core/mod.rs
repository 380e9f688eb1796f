pub mod data;
pub mod io;
pub mod models;
pub mod utils;
