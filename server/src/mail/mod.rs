pub mod compose;
pub mod gmail;
pub mod transport;
