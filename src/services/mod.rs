pub mod cache;
pub mod cef;
pub mod cid;
