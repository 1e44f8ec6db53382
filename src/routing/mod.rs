//! Path routing for navigation requests

pub mod router;
pub mod uri;

pub use router::{NavRequest, Router};
pub use uri::{create_uri, next_page_uri, page_param, split_uri, Params};
