pub mod cleanup;
pub mod codes;
pub mod session;
pub mod token;
