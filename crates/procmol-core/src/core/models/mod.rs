pub mod configuration;
pub mod element;
pub mod ids;
pub mod simbox;
pub mod species;
