//! Loader error types.

use std::io;

use reqplus_sdk::Exception;

use crate::library::LinkError;

/// The `LoadError` category surfaced to the host, distinguished by message.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Bytecode buffer shorter than its header or its declared size
    #[error("wrong binary size - {name}")]
    WrongBinarySize {
        /// Declared feature name
        name: String,
    },

    /// Bytecode version tag does not match the runtime
    #[error("wrong binary version - {name} (expected \"{expected}\", but given \"{actual}\")")]
    WrongBinaryVersion {
        /// Declared feature name
        name: String,
        /// Tag the runtime accepts
        expected: String,
        /// Tag found in the header
        actual: String,
    },

    /// The bytecode reader rejected an image that passed validation
    #[error("load error - {name}")]
    Corrupted {
        /// Declared feature name
        name: String,
    },

    /// A native module could not be staged, linked, or resolved
    #[error("failed load {name} (in {vfs})")]
    FailedLoad {
        /// Declared feature name
        name: String,
        /// Label of the originating VFS
        vfs: String,
        /// What went wrong underneath
        #[source]
        cause: StageError,
    },
}

/// Errors from any of the three load primitives.
#[derive(Debug, thiserror::Error)]
pub enum RequireError {
    /// Rejected by the loader
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Raised by the host while compiling or running the loaded code
    #[error(transparent)]
    Script(#[from] Exception),
}

/// A failed step while materializing and linking a native module.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Creating the private temp directory failed
    #[error("cannot create temp directory under {root}: {source}")]
    TempDir {
        /// Temp root that was tried
        root: String,
        /// Underlying error
        source: io::Error,
    },

    /// Creating or writing the temp image failed
    #[error("cannot write image to {path}: {source}")]
    Write {
        /// Temp file path
        path: String,
        /// Underlying error
        source: io::Error,
    },

    /// The dynamic linker refused the image
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Neither an init hook nor embedded bytecode was exported
    #[error("no entry point: expected {init} or {bytecode}")]
    NoEntryPoint {
        /// Expected init symbol
        init: String,
        /// Expected bytecode symbol
        bytecode: String,
    },

    /// A staged resource left the ledger before it was handed over
    #[error("staged {0} was released early")]
    Unstaged(&'static str),
}
