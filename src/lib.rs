//! Partbox - splits a file into independently encrypted parts and merges them back
//!
//! Each part holds exactly one fixed-size chunk of the original file,
//! encrypted under a key derived from a single base secret and the
//! chunk's 1-based index. Parts are self-contained: a 16-byte salt
//! stored in the clear, followed by an authenticated-encryption token.

#![forbid(unsafe_code)]

pub mod chunkcrypt;
pub mod error;
pub mod file_ops;
pub mod keyderive;
pub mod partname;
pub mod passphrase;
