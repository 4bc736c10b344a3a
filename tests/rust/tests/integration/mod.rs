//! End-to-end connection flow scenarios.

mod http_route;
