pub mod access_token_service;
pub mod signing_key_manager;
pub mod token_codec;

pub use access_token_service::AccessTokenService;
pub use signing_key_manager::SigningKeyManager;
