#![allow(dead_code)]

pub mod env;
pub mod fixtures;
pub mod transport;

pub use env::get_test_cone_url;
pub use transport::StaticTransport;

use dal_engine::{ClientConfig, DalConnection};

/// Connection whose fetches are answered by `transport`.
pub fn connection(protocol: &str, version: &str, transport: StaticTransport) -> DalConnection {
    DalConnection::open_with(
        "http://dal.test/service",
        protocol,
        version,
        ClientConfig::default(),
        Box::new(transport),
    )
    .expect("open connection")
}
