mod common;
mod conversion_tests;
mod mixed_tests;
