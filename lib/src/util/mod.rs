pub mod binary;
pub mod dds;
pub mod file;
