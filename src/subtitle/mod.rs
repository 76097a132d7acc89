//! Модуль для работы с субтитрами
//!
//! Этот модуль содержит парсер временных меток, парсер блоков субтитров
//! и загрузку субтитров по сети.

pub mod fetch;
pub mod parser;
pub mod timestamp;

pub use parser::{load_document, parse_document, parse_file, Segment, Timeline};
pub use timestamp::parse_timestamp;
