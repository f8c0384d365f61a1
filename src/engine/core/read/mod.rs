pub mod dataset_document;
pub mod file_processor;
pub mod scratch_buffer;

#[cfg(test)]
mod scratch_buffer_test;
