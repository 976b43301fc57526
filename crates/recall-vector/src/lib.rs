#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod schema;
pub mod store;
pub mod table;

pub use store::{CollectionMetric, LanceVectorStore, Neighbor};
