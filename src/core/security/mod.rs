// Security module for path containment and access control
//
// Every request path goes through the `PathGuard` before anything on disk is
// touched, so deny-listed files and directories can never be reached no
// matter how the path is spelled.

pub mod path_guard;

pub use path_guard::{PathGuard, PathSecurityError};
