//! Job CRUD split by direction.

mod read;
mod write;
