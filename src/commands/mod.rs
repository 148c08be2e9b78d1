pub mod checks;
pub mod configure;
pub mod forget;
pub mod help;
pub mod ping;
