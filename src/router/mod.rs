pub mod index;

pub use index::routes;
