//! vCard 2.1 parsing: unfolding, content-line lexing, and record decoding.

pub mod decoder;
pub mod error;
pub mod lexer;
