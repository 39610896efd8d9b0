//! Bus collaborator abstraction.
//!
//! The core never touches a CAN controller. It hands each outgoing frame to a
//! [`CanBus`] and learns synchronously whether the controller accepted it.
//! Frame arrival flows the other way, through
//! [`Node::frame_received`](crate::Node::frame_received).

use std::{convert::Infallible, fmt};

use leia_proto::Frame;

/// Transmit side of a CAN controller.
pub trait CanBus {
    /// Failure reported by the controller.
    type Error: fmt::Display;

    /// Queue `frame` for transmission, reporting success or failure.
    ///
    /// Must not block waiting for the peer: the protocol never awaits an
    /// acknowledgement.
    fn transmit(&mut self, frame: &Frame) -> Result<(), Self::Error>;
}

impl<B: CanBus + ?Sized> CanBus for &mut B {
    type Error = B::Error;

    fn transmit(&mut self, frame: &Frame) -> Result<(), Self::Error> {
        (**self).transmit(frame)
    }
}

/// Collects every frame; never fails.
impl CanBus for Vec<Frame> {
    type Error = Infallible;

    fn transmit(&mut self, frame: &Frame) -> Result<(), Self::Error> {
        self.push(frame.clone());
        Ok(())
    }
}
