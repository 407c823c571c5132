pub mod account;
pub mod federated;
pub mod secrets;
