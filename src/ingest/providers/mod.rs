pub mod fotmob;
