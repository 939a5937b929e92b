//! Control surface serviced at the top of every tick
//!
//! The HTTP server (or any other front-end) never touches agent state
//! itself. It queues [`ControlRequest`]s; the loop drains a bounded number
//! per tick, applies them and answers status requests through the ticket
//! that came with the request.

use crate::agent::{ControlRequest, StatusSnapshot};

/// Source of control requests
pub trait ControlSurface {
    /// Reply handle carried alongside a request
    type Ticket;

    /// Next pending request, without waiting
    fn next_request(&mut self) -> Option<(ControlRequest, Self::Ticket)>;

    /// Answer a [`ControlRequest::Status`]
    fn reply_status(&mut self, ticket: Self::Ticket, status: StatusSnapshot);
}

/// Surface that never has requests
#[derive(Debug, Clone, Copy, Default)]
pub struct NoControl;

impl ControlSurface for NoControl {
    type Ticket = ();

    fn next_request(&mut self) -> Option<(ControlRequest, Self::Ticket)> {
        None
    }

    fn reply_status(&mut self, _ticket: Self::Ticket, _status: StatusSnapshot) {}
}
