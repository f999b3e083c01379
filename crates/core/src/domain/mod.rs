pub mod filter;
pub mod preset;
pub mod scan;
