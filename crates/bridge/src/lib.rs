// Nowplay host bridge
// JSON wire protocol over the session controller, exposed through a C ABI
// and, with the `android` feature, JNI.

pub mod bridge;
pub mod ffi;
pub mod logging;
pub mod platform;
pub mod wire;

#[cfg(feature = "android")]
mod jni_bridge;

pub use bridge::NowplayBridge;
pub use logging::init_logging;
pub use platform::{JsonHostCallback, MessageSink, PlatformSurface};
pub use wire::{Outbound, PlatformMessage, Request};
