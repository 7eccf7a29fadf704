pub mod conf;
pub mod logging;
pub mod runtime;
pub mod traffic;
pub mod upstream;
