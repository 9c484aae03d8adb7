pub mod deleter;
pub mod reader;
pub mod renamer;
pub mod writer;
