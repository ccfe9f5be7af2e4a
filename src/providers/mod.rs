pub mod xe;
