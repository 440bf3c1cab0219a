pub mod aodp;
pub mod command;
pub mod dedup;
pub mod fastx;
pub mod file;
pub mod flash;
pub mod index;
pub mod results;
pub mod sequence;
pub mod system;
pub mod upload;
