// Purpose - external interfaces, format conversions

pub mod converter;
pub mod input;
pub mod midi;
pub mod storage;
