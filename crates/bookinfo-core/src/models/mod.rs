pub mod book_info;
pub mod file;

pub use book_info::*;
pub use file::*;
