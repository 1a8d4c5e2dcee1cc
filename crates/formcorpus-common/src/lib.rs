pub mod cell;
pub mod function;
pub mod operator;
pub mod token;

pub use cell::*;
pub use function::*;
pub use operator::*;
pub use token::*;
