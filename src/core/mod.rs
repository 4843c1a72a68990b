pub mod buffer;
pub mod collector;
pub mod registrar;
pub mod sample;
pub mod threshold;
