pub mod depfile;
pub mod frontend;
pub mod generate;
