//! Domains module containing request handling organized by concern.
//!
//! Each subdomain owns one area of the file server: serving byte ranges of
//! files, listing directories, and accepting uploads.

pub mod listing;
pub mod ranges;
pub mod uploads;
