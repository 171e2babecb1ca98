//! fepbr - command line front end for the FePBR scene porter
//!
//! Runs the engines of `fepbr-core` against JSON scene files through the
//! file-backed [`host::SceneFileHost`].

pub mod commands;
pub mod gltf_import;
pub mod host;

pub use host::SceneFileHost;
