//! Dossier storage.
//!
//! [`dossiers`] reads and writes one dossier record; [`index`] scans the data root to list,
//! search and delete dossiers.

pub mod dossiers;
pub mod index;
