pub mod channels;
pub mod db;
