use std::io;

/// An error which can occur while decoding or re-encoding a class file. These are fatal to the
/// class or method being processed; recoverable type errors found during tracing are collected as
/// [`crate::verifier::Error`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ClassError {
    /// A generic I/O error (truncated buffer, etc).
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The constant pool index was out of range, hit the reserved slot after a long/double, or the
    /// entry did not have the expected tag.
    #[error("malformed constant pool: {0}")]
    MalformedPool(String),

    /// A field or method descriptor could not be parsed.
    #[error("malformed descriptor {descriptor:?}: {reason}")]
    MalformedDescriptor {
        descriptor: String,
        reason: &'static str,
    },

    /// An opcode that is not defined by the JVM specification.
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: u32 },

    /// The instruction stream or the control flow graph built from it violates a structural
    /// constraint (jump into the middle of an instruction, fallthrough out of a return block, ...).
    #[error("malformed code: {0}")]
    MalformedCode(String),

    /// A `StackMapTable` attribute with an unknown frame or verification type tag.
    #[error("malformed stack map: {0}")]
    MalformedStackMap(String),
}

impl ClassError {
    pub fn pool(message: impl Into<String>) -> Self {
        ClassError::MalformedPool(message.into())
    }

    pub fn code(message: impl Into<String>) -> Self {
        ClassError::MalformedCode(message.into())
    }

    pub fn stack_map(message: impl Into<String>) -> Self {
        ClassError::MalformedStackMap(message.into())
    }
}
