//! A self-maintaining circular overlay network over UDP. Every node
//! keeps track of its left and right neighbour as well as its second
//! neighbour on the left, which lets the ring survive the loss of
//! multiple nonconsecutive nodes. User messages travel one way around
//! the ring and are acknowledged by their own return.

pub mod addr;
pub mod message;
pub mod node;
pub mod timer;

mod udp;

pub use addr::Addr;
pub use message::{Message, MsgType, MAX_DATA_LENGTH};
pub use node::{Node, NodeError};
