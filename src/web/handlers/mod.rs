pub mod account;
pub mod mcp;
pub mod oauth;
