//! Transport and hardware seams used by the lighting controllers.
//!
//! Every controller talks to the outside world through one of these traits so
//! the manager can run against real sockets and SPI buses on the device and
//! against recording fakes in tests.

pub mod clock;
pub mod http;
pub mod mdns;
pub mod strip;
pub mod ws2812_spi;
