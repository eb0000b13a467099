//! A crate for reading, analyzing, verifying, and writing Java class files. The centerpiece is
//! the bytecode analysis engine: a typed control flow graph built from a method's instruction
//! stream, an abstract interpreter that propagates stack/locals frames through it, and a
//! merge-based type checker that assigns verifiable types to every program point. The binary
//! codec around it is compliant with the class file format of the JVM specification.

// Ensure each result error is either unwrapped or returned
#![deny(unused_must_use)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate log;

pub mod analysis;
pub mod class;
pub mod descriptor;
pub mod error;
pub mod instruction;
pub mod types;
pub mod verifier;

pub use crate::class::ClassFile;
pub use crate::error::ClassError;
pub use crate::verifier::{verify_class, verify_method, TypeChecker, VerifyError};

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads and parses a class file from disk.
pub fn read_class(path: impl AsRef<Path>) -> Result<ClassFile, ClassError> {
    let mut file = File::open(path)?;

    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    ClassFile::parse(&data)
}
