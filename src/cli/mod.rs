//! Command-line front end

pub mod play;
