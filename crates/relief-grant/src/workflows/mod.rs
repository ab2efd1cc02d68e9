pub mod relief;
