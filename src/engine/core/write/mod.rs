pub mod batch_file;
pub mod counting_writer;
pub mod record_writer;
