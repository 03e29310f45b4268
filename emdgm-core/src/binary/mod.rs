//! Курсор чтения и писатель поверх фиксированного байтового буфера.
//!
//! Порядок байт задаётся один раз на файл ([`Endian`]) и применяется ко
//! всем многобайтовым полям.

pub mod read;
pub mod write;

pub use read::*;
pub use write::*;
