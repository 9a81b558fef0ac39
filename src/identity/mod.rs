// Identity module - Who holds, sells, votes and organises

mod address;

pub use address::*;
