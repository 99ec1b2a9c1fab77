/*
[INPUT]:  zkLogin crypto submodules
[OUTPUT]: Nonce, address and signature primitives
[POS]:    zkLogin crypto - module wiring
[UPDATE]: When adding crypto primitives
*/

pub mod address;
pub mod nonce;
pub mod poseidon;
pub mod signature;

pub use address::{
    AddressParams, compute_address_from_seed, compute_zklogin_address, gen_address_seed,
    hash_ascii_str_to_field,
};
pub use nonce::{
    extended_public_key, extended_public_key_base64, generate_nonce, generate_randomness,
    parse_extended_public_key,
};
pub use poseidon::poseidon_hash;
pub use signature::assemble_zklogin_signature;
