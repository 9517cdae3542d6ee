pub mod oauth_code;
