#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![doc(test(attr(allow(clippy::print_stdout))))]

pub mod error;
mod sparql;
pub mod store;

pub mod model {
    pub use hexastore_model::*;
    pub use oxrdf::Triple as RdfTriple;
}

pub mod storage {
    pub use hexastore_storage::*;
}

pub mod engine {
    pub use hexastore_engine::*;
}
