//! Integration tests for the FePBR engines
//!
//! Drive whole export jobs and batch imports against the recording test
//! host, with real files in temporary directories.
