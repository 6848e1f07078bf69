extern crate log;
pub mod dissolve;
pub mod error;
pub mod geofile;
pub mod interaction;
