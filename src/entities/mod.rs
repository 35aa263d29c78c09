pub mod movimentacao;
pub mod produto;
pub mod profile;
pub mod revoked_token;

pub use movimentacao::MovementKind;
