//! Common data types shared between the Parley relay server and client core.

pub mod types;
