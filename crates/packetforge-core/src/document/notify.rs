//! Observer contracts at the document boundary.
//!
//! Both contracts are fire-and-forget and synchronous on the calling
//! context; observers that need asynchronous delivery marshal it
//! themselves.

use std::ops::Range;

use super::view::ProtocolLayer;

/// Receives the rebuilt layer stack after every structural change,
/// exactly once per change.
pub trait ChangeNotifier {
    fn notify(&mut self, layers: &[ProtocolLayer]);
}

/// Notifier that ignores every rebuild.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl ChangeNotifier for NullNotifier {
    fn notify(&mut self, _layers: &[ProtocolLayer]) {}
}

/// External byte-display collaborator: mirrors the current wire bytes and
/// the selected field's absolute range. Pure side effects, no feedback
/// into the document.
pub trait ByteDisplay {
    fn set_bytes(&mut self, bytes: &[u8]);
    fn set_selected(&mut self, range: Range<usize>);
}

/// Byte display that discards everything.
#[derive(Debug, Default)]
pub struct NullByteDisplay;

impl ByteDisplay for NullByteDisplay {
    fn set_bytes(&mut self, _bytes: &[u8]) {}
    fn set_selected(&mut self, _range: Range<usize>) {}
}
