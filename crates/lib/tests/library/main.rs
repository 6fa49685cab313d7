mod common;
mod render_tests;
mod resolve_tests;
mod router_tests;
