pub mod cli;
pub mod converter;
pub mod emit;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod producer;
pub mod singbox;
pub mod transform;
pub mod validator;

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
