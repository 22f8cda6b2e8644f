//! Coinbase, header and block construction

pub mod generation;
pub mod merkle;
pub mod serialize;

pub use generation::{BuildError, GenerationOptions, GenerationTransaction, SignatureScript};
pub use merkle::MerkleTree;
pub use serialize::{
    HeaderTemplate, serialize_block, serialize_coinbase, serialize_cycle, serialize_header,
    serialize_number, serialize_string, var_int,
};
