pub mod staging_db;
