pub mod archive;
pub mod media;
pub mod posts;
pub mod social;
