pub mod db;
pub mod expected_file;
