//! vCard 2.1 building: encoding, sub-encodings, and line folding.

pub mod encoder;
pub mod fold;
pub mod qp;
