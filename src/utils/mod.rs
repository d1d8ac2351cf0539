pub mod actions;
pub mod path_validator;
pub mod yaml;
