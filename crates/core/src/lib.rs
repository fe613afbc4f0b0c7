pub mod detection;
pub mod hashing;
pub mod identity;
pub mod pipeline;
pub mod shared;
pub mod tracking;
pub mod video;

#[cfg(test)]
mod test_support;
