use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{after, bounded, select, Receiver, Sender};
use log::{debug, info, warn};
use rand::Rng;

use crate::addr::{self, Addr};
use crate::message::{Message, MsgType};
use crate::timer::Timer;
use crate::udp::{UdpMessage, UdpService};

const ALIVE_TIME: Duration = Duration::from_millis(50);
const KICK_TIME: Duration = Duration::from_millis(250);
const BROADCAST_TIME: Duration = Duration::from_millis(500);
const MSG_RESEND_INTERVAL: Duration = Duration::from_millis(200);
const KICK_RESEND_INTERVAL: Duration = Duration::from_millis(20);
const LONELY_DELAY: Duration = Duration::from_millis(100);

// The maintenance loop wakes up at least this often to poll its timers.
const MAINTENANCE_TICK: Duration = Duration::from_millis(5);

const BUFFER_SIZE: usize = 32;
const MAX_RESEND_COUNT: u32 = 5;
const MAX_READ_COUNT: u32 = 100;
const MAX_RESENDERS: usize = 100;

#[derive(Debug)]
pub enum NodeError {
    IoError(io::Error),
    AddrError(local_ip_address::Error),
}

impl From<io::Error> for NodeError {
    fn from(e: io::Error) -> Self {
        NodeError::IoError(e)
    }
}

impl From<local_ip_address::Error> for NodeError {
    fn from(e: local_ip_address::Error) -> Self {
        NodeError::AddrError(e)
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::IoError(e) => write!(f, "overlay io error: {}", e),
            NodeError::AddrError(e) => write!(f, "overlay address error: {}", e),
        }
    }
}

impl std::error::Error for NodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Disconnected,
    Connected,
    /// Connected, but the second neighbour on the left is unknown until
    /// the next UPDATE names it.
    Detached2ndLeft,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct HelloData {
    new_right: Addr,
    new_left: Addr,
    new_left2nd: Addr,
}

impl HelloData {
    fn pack(&self) -> [u8; 48] {
        let mut p = [0; 48];
        p[..16].copy_from_slice(&self.new_right.0);
        p[16..32].copy_from_slice(&self.new_left.0);
        p[32..48].copy_from_slice(&self.new_left2nd.0);
        p
    }

    fn unpack(p: &[u8]) -> Option<HelloData> {
        if p.len() < 48 {
            return None;
        }
        Some(HelloData {
            new_right: unpack_addr(&p[..16]),
            new_left: unpack_addr(&p[16..32]),
            new_left2nd: unpack_addr(&p[32..48]),
        })
    }
}

/// Zero fields mean "leave that link unchanged" on the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct UpdateData {
    right: Addr,
    left: Addr,
    left2nd: Addr,
}

impl UpdateData {
    fn pack(&self) -> [u8; 48] {
        let mut p = [0; 48];
        p[..16].copy_from_slice(&self.right.0);
        p[16..32].copy_from_slice(&self.left.0);
        p[32..48].copy_from_slice(&self.left2nd.0);
        p
    }

    fn unpack(p: &[u8]) -> Option<UpdateData> {
        if p.len() < 48 {
            return None;
        }
        Some(UpdateData {
            right: unpack_addr(&p[..16]),
            left: unpack_addr(&p[16..32]),
            left2nd: unpack_addr(&p[32..48]),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KickData {
    dead_node: Addr,
    sender_node: Addr,
}

impl KickData {
    fn pack(&self) -> [u8; 32] {
        let mut p = [0; 32];
        p[..16].copy_from_slice(&self.dead_node.0);
        p[16..32].copy_from_slice(&self.sender_node.0);
        p
    }

    fn unpack(p: &[u8]) -> Option<KickData> {
        if p.len() < 32 {
            return None;
        }
        Some(KickData {
            dead_node: unpack_addr(&p[..16]),
            sender_node: unpack_addr(&p[16..32]),
        })
    }
}

fn unpack_addr(p: &[u8]) -> Addr {
    let mut addr = Addr::zero();
    addr.0.copy_from_slice(&p[..16]);
    addr
}

/// Links a HELLO reply proposes to a broadcasting node. A connected
/// receiver offers the slot between itself and its current right; a
/// lonely receiver proposes a two-node ring.
fn hello_proposal(connected: bool, this: Addr, right: Addr, left: Addr, from: Addr) -> HelloData {
    if connected {
        HelloData {
            new_right: right,
            new_left: this,
            new_left2nd: left,
        }
    } else {
        HelloData {
            new_right: this,
            new_left: this,
            new_left2nd: from,
        }
    }
}

/// UPDATE messages a joining node must send after adopting the links
/// from a HELLO sent by `from`. The doublet and two-node cases overlap
/// with the general one in ways that are easy to get wrong, hence the
/// explicit branches.
fn join_updates(this: Addr, from: Addr, hd: &HelloData) -> Vec<(Addr, UpdateData)> {
    if hd.new_right == hd.new_left {
        // Two disconnected nodes are connecting.
        vec![(
            hd.new_left,
            UpdateData {
                right: this,
                left: this,
                left2nd: from,
            },
        )]
    } else if hd.new_right == hd.new_left2nd {
        // Connecting to a connected doublet.
        vec![
            (
                hd.new_right,
                UpdateData {
                    left: this,
                    left2nd: hd.new_left,
                    ..Default::default()
                },
            ),
            (
                hd.new_left,
                UpdateData {
                    right: this,
                    left2nd: this,
                    ..Default::default()
                },
            ),
        ]
    } else {
        vec![
            (
                hd.new_right,
                UpdateData {
                    left: this,
                    left2nd: hd.new_left,
                    ..Default::default()
                },
            ),
            (
                hd.new_left,
                UpdateData {
                    right: this,
                    ..Default::default()
                },
            ),
        ]
    }
}

/// Handle to a running overlay node. All interaction with the ring goes
/// through this handle and the receivers returned by [`Node::init`];
/// the link pointers themselves are owned by the maintenance thread.
pub struct Node {
    addr: Addr,
    to_send_tx: Sender<Message>,
    to_forward_tx: Sender<Message>,
    connected: Arc<AtomicBool>,
    stop_tx: Sender<()>,
}

impl Node {
    /// Start the overlay on `port`. Returns the node handle plus three
    /// receivers: messages this node sent that completed a full lap,
    /// messages from other nodes in transit, and addresses of nodes
    /// found dead.
    pub fn init(
        interface: &str,
        port: u16,
    ) -> Result<(Node, Receiver<Message>, Receiver<Message>, Receiver<Addr>), NodeError> {
        let this_node = addr::network_addr(interface)?;
        let any_node = addr::broadcast_addr();
        let udp = UdpService::init(port)?;

        let (from_user_to_user_tx, from_user_to_user_rx) = bounded(BUFFER_SIZE);
        let (from_user_to_other_tx, from_user_to_other_rx) = bounded(BUFFER_SIZE);
        let (dead_nodes_tx, dead_nodes_rx) = bounded(BUFFER_SIZE);
        let (to_send_tx, to_send_rx) = bounded(BUFFER_SIZE);
        let (to_forward_tx, to_forward_rx) = bounded(BUFFER_SIZE);
        let (resender_timed_out_tx, resender_timed_out_rx) = bounded(MAX_RESENDERS);
        let (stop_tx, stop_rx) = bounded(1);

        let connected = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            state: NodeState::Disconnected,
            this_node,
            left_node: Addr::zero(),
            left2nd_node: Addr::zero(),
            right_node: Addr::zero(),
            any_node,
            udp,
            from_user_to_user_tx,
            from_user_to_other_tx,
            dead_nodes_tx,
            alive_timer: Timer::new(),
            kick_timer: Timer::new(),
            broadcast_timer: Timer::new(),
            left_is_alive: false,
            left2nd_is_alive: false,
            left2nd_expected: false,
            resenders: HashMap::new(),
            resender_timed_out_tx,
            connected: connected.clone(),
        };
        thread::spawn(move || worker.run(to_send_rx, to_forward_rx, resender_timed_out_rx, stop_rx));

        info!("overlay running on {}", this_node);

        let node = Node {
            addr: this_node,
            to_send_tx,
            to_forward_tx,
            connected,
            stop_tx,
        };
        Ok((node, from_user_to_user_rx, from_user_to_other_rx, dead_nodes_rx))
    }

    pub fn addr(&self) -> Addr {
        self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Send a user message around the ring. It is retried until it
    /// completes a lap and comes back on the "own messages" receiver.
    /// Reserved types are refused.
    pub fn send_message(&self, msg: Message) {
        if !msg.mtype.is_user() {
            return;
        }
        self.to_send_tx.send(msg).ok();
    }

    /// Pass a foreign message on to the next node.
    pub fn forward_message(&self, msg: Message) {
        if !msg.mtype.is_user() {
            return;
        }
        self.to_forward_tx.send(msg).ok();
    }

    pub fn stop(&self) {
        self.stop_tx.try_send(()).ok();
    }
}

struct Resender {
    msg: Message,
    tries_left: u32,
    stop_tx: Sender<()>,
}

struct Worker {
    state: NodeState,

    this_node: Addr,
    left_node: Addr,
    left2nd_node: Addr,
    right_node: Addr,
    any_node: Addr,

    udp: UdpService,

    from_user_to_user_tx: Sender<Message>,
    from_user_to_other_tx: Sender<Message>,
    dead_nodes_tx: Sender<Addr>,

    alive_timer: Timer,
    kick_timer: Timer,
    broadcast_timer: Timer,
    left_is_alive: bool,
    left2nd_is_alive: bool,
    left2nd_expected: bool,

    resenders: HashMap<u32, Resender>,
    resender_timed_out_tx: Sender<u32>,

    connected: Arc<AtomicBool>,
}

impl Worker {
    fn run(
        mut self,
        to_send_rx: Receiver<Message>,
        to_forward_rx: Receiver<Message>,
        resender_timed_out_rx: Receiver<u32>,
        stop_rx: Receiver<()>,
    ) {
        let udp_rx = self.udp.receive_rx.clone();
        self.update_state(NodeState::Disconnected);

        loop {
            if self.is_connected_state() {
                if self.alive_timer.timed_out() {
                    self.alive_timer.stop();
                    self.left_is_alive = false;
                    self.left2nd_is_alive = false;
                    self.left2nd_expected = self.state != NodeState::Detached2ndLeft
                        && self.left2nd_node != self.this_node;
                    self.send_control(self.left_node, MsgType::PING, &[]);
                    if self.left2nd_expected {
                        self.send_control(self.left2nd_node, MsgType::PING, &[]);
                    }
                    self.kick_timer.reset(KICK_TIME);
                }

                if self.kick_timer.timed_out() {
                    self.kick_timer.stop();
                    if self.left_is_alive {
                        // The kick timer can only get this far with the
                        // left alive when left2nd stayed silent, and that
                        // is leftNode's problem to deal with.
                        self.alive_timer.reset(ALIVE_TIME);
                    } else {
                        self.restore_network();
                    }
                }
            } else if self.state == NodeState::Disconnected && self.broadcast_timer.timed_out() {
                self.send_control(self.any_node, MsgType::BROADCAST, &[]);
                self.broadcast_timer.reset(BROADCAST_TIME);
            }

            select! {
                recv(udp_rx) -> umsg => match umsg {
                    Ok(umsg) => self.process_udp(umsg),
                    Err(_) => return,
                },
                recv(to_forward_rx) -> msg => if let Ok(msg) = msg {
                    self.forward_msg(&msg);
                },
                recv(to_send_rx) -> msg => if let Ok(msg) = msg {
                    self.add_resender(msg, MSG_RESEND_INTERVAL);
                },
                recv(resender_timed_out_rx) -> id => if let Ok(id) = id {
                    self.on_resender_timeout(id);
                },
                recv(stop_rx) -> _ => {
                    self.shutdown();
                    return;
                },
                default(MAINTENANCE_TICK) => {}
            }
        }
    }

    fn is_connected_state(&self) -> bool {
        matches!(self.state, NodeState::Connected | NodeState::Detached2ndLeft)
    }

    fn process_udp(&mut self, umsg: UdpMessage) {
        let mut msg = match Message::unpack(&umsg.payload) {
            Some(msg) => msg,
            None => return,
        };

        if msg.read_count > MAX_READ_COUNT {
            return;
        }
        msg.read_count += 1;

        let from = umsg.from;
        match msg.mtype {
            MsgType::BROADCAST => self.on_broadcast(from),
            MsgType::HELLO => self.on_hello(from, &msg),
            MsgType::UPDATE => self.on_update(&msg),
            MsgType::GET => {
                if self.state == NodeState::Connected {
                    let ud = UpdateData {
                        left2nd: self.left_node,
                        ..Default::default()
                    };
                    self.send_control(from, MsgType::UPDATE, &ud.pack());
                }
            }
            MsgType::PING => {
                if self.is_connected_state() {
                    self.send_control(from, MsgType::ALIVE, &[]);
                }
            }
            MsgType::ALIVE => self.on_alive(from),
            MsgType::KICK => self.on_kick(&msg),
            _ => {}
        }

        if msg.mtype.is_user() {
            self.deliver_user(from, msg);
        }
    }

    fn on_broadcast(&mut self, from: Addr) {
        if from == self.this_node {
            return;
        }

        let hd = hello_proposal(
            self.is_connected_state(),
            self.this_node,
            self.right_node,
            self.left_node,
            from,
        );

        // Two lonely nodes replying to each other at the same instant
        // would form disjoint doublets; the delay breaks the symmetry.
        if self.state == NodeState::Disconnected {
            let jitter = rand::thread_rng().gen_range(0..50);
            thread::sleep(LONELY_DELAY + Duration::from_millis(jitter));
        }
        self.send_control(from, MsgType::HELLO, &hd.pack());
    }

    fn on_hello(&mut self, from: Addr, msg: &Message) {
        if self.state != NodeState::Disconnected {
            return;
        }
        let hd = match HelloData::unpack(msg.data()) {
            Some(hd) => hd,
            None => return,
        };

        self.right_node = hd.new_right;
        self.left_node = hd.new_left;
        self.left2nd_node = hd.new_left2nd;
        self.update_state(NodeState::Connected);

        for (to, ud) in join_updates(self.this_node, from, &hd) {
            self.send_control(to, MsgType::UPDATE, &ud.pack());
        }
    }

    fn on_update(&mut self, msg: &Message) {
        let ud = match UpdateData::unpack(msg.data()) {
            Some(ud) => ud,
            None => return,
        };

        if !ud.right.is_zero() {
            self.right_node = ud.right;
        }
        if !ud.left.is_zero() {
            self.left_node = ud.left;
        }
        if !ud.left2nd.is_zero() {
            self.left2nd_node = ud.left2nd;
        }

        // Covers both a node in detached2ndLeft getting its missing
        // link and the second half of the two-lonely-nodes handshake.
        self.update_state(NodeState::Connected);
    }

    fn on_alive(&mut self, from: Addr) {
        if !self.is_connected_state() {
            return;
        }
        if from == self.left_node {
            self.left_is_alive = true;
        } else if from == self.left2nd_node {
            self.left2nd_is_alive = true;
        }

        if self.left_is_alive && (self.left2nd_is_alive || !self.left2nd_expected) {
            if !self.kick_timer.stop() {
                debug!("kick timer was stopped after it expired");
            }
            self.alive_timer.reset(ALIVE_TIME);
        }
    }

    fn on_kick(&mut self, msg: &Message) {
        if !self.is_connected_state() {
            return;
        }
        if KickData::unpack(msg.data()).is_none() {
            return;
        }

        // Our own kick coming back means it has lapped the ring;
        // anything else is still on its way around.
        if self.resenders.contains_key(&msg.id) {
            self.remove_resender(msg.id);
        } else {
            self.forward_msg(msg);
        }
    }

    fn deliver_user(&mut self, from: Addr, msg: Message) {
        if !self.is_connected_state() || from != self.right_node {
            return;
        }

        if self.resenders.contains_key(&msg.id) {
            self.remove_resender(msg.id);
            // Buffered channels; drop on the floor if the user is slow.
            self.from_user_to_user_tx.try_send(msg).ok();
        } else {
            self.from_user_to_other_tx.try_send(msg).ok();
        }
    }

    fn restore_network(&mut self) {
        if !self.left_is_alive && !self.left2nd_is_alive {
            // Both nodes on the left are silent, or the left is silent
            // while the left2nd was skipped (two-node ring, or detached).
            // Either way the ring cannot be repaired from here.
            if self.left2nd_node != self.this_node && !self.left2nd_node.is_zero() {
                self.dead_nodes_tx.try_send(self.left2nd_node).ok();
            }
            self.dead_nodes_tx.try_send(self.left_node).ok();
            self.update_state(NodeState::Disconnected);
        } else if !self.left_is_alive && self.left2nd_is_alive {
            let dead_node = self.left_node;
            self.left_node = self.left2nd_node;

            let ud = UpdateData {
                left2nd: self.left2nd_node,
                ..Default::default()
            };
            self.send_control(self.right_node, MsgType::UPDATE, &ud.pack());
            let ud = UpdateData {
                right: self.this_node,
                ..Default::default()
            };
            self.send_control(self.left_node, MsgType::UPDATE, &ud.pack());

            // The old left2nd link now points at our new left; blank it
            // and ask the new left who its left is.
            self.update_state(NodeState::Detached2ndLeft);
            self.send_control(self.left_node, MsgType::GET, &[]);

            info!("kicked unresponsive node {}", dead_node);
            self.dead_nodes_tx.try_send(dead_node).ok();

            let kick = KickData {
                dead_node,
                sender_node: self.this_node,
            };
            self.add_resender(Message::new(MsgType::KICK, &kick.pack()), KICK_RESEND_INTERVAL);

            self.alive_timer.reset(ALIVE_TIME);
        } else {
            warn!("kick timer expired with both neighbours alive");
        }
    }

    fn send_control(&self, to: Addr, mtype: MsgType, data: &[u8]) {
        let msg = Message::new(mtype, data);
        self.udp.send(UdpMessage {
            from: self.this_node,
            to,
            payload: msg.pack(),
        });
    }

    fn forward_msg(&self, msg: &Message) {
        self.udp.send(UdpMessage {
            from: self.this_node,
            to: self.left_node,
            payload: msg.pack(),
        });
    }

    fn add_resender(&mut self, msg: Message, resend_interval: Duration) {
        let id = msg.id;
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let resender_timed_out_tx = self.resender_timed_out_tx.clone();

        thread::spawn(move || loop {
            let timeout = after(resend_interval);
            select! {
                recv(stop_rx) -> _ => return,
                recv(timeout) -> _ => {
                    if resender_timed_out_tx.send(id).is_err() {
                        return;
                    }
                }
            }
        });

        self.forward_msg(&msg);
        self.resenders.insert(
            id,
            Resender {
                msg,
                tries_left: MAX_RESEND_COUNT,
                stop_tx,
            },
        );
    }

    fn on_resender_timeout(&mut self, id: u32) {
        let msg = match self.resenders.get_mut(&id) {
            None => return,
            Some(re) => {
                if re.tries_left == 0 {
                    None
                } else {
                    re.tries_left -= 1;
                    Some(re.msg.clone())
                }
            }
        };

        match msg {
            Some(msg) => self.forward_msg(&msg),
            None => {
                // The link to the left is gone for good; start over.
                warn!("resend exhausted for message {:#010x}", id);
                self.remove_resender(id);
                self.update_state(NodeState::Disconnected);
            }
        }
    }

    fn remove_resender(&mut self, id: u32) {
        if let Some(re) = self.resenders.remove(&id) {
            re.stop_tx.try_send(()).ok();
        }
    }

    fn shutdown(&mut self) {
        let ids: Vec<u32> = self.resenders.keys().copied().collect();
        for id in ids {
            self.remove_resender(id);
        }
        self.state = NodeState::Stopped;
        self.connected.store(false, Ordering::Relaxed);
    }

    fn update_state(&mut self, state: NodeState) {
        match state {
            NodeState::Connected => {
                if self.left2nd_node.is_zero() {
                    // An UPDATE restored the other links but the second
                    // left is still unknown; keep waiting for it.
                    self.state = NodeState::Detached2ndLeft;
                } else {
                    info!(
                        "connected as {} -> {} -> {} -> {}",
                        self.right_node, self.this_node, self.left_node, self.left2nd_node
                    );
                    self.state = NodeState::Connected;
                }
                self.alive_timer.reset(ALIVE_TIME);
                self.kick_timer.stop();
                self.broadcast_timer.stop();
            }
            NodeState::Disconnected => {
                // Zeroing is not strictly needed, but stale links are a
                // debugging nightmare when reconnecting.
                self.left_node.set_zero();
                self.right_node.set_zero();
                self.left2nd_node.set_zero();

                info!("disconnected");

                self.state = NodeState::Disconnected;
                self.broadcast_timer.reset(BROADCAST_TIME);
                self.alive_timer.stop();
                self.kick_timer.stop();
            }
            NodeState::Detached2ndLeft => {
                self.left2nd_node.set_zero();
                self.state = NodeState::Detached2ndLeft;
            }
            _ => self.state = state,
        }

        self.connected
            .store(self.is_connected_state(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr(last: u8) -> Addr {
        Addr::from(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn hello_from_connected_node_offers_its_left_slot() {
        let (this, right, left, joiner) = (addr(1), addr(2), addr(3), addr(9));
        let hd = hello_proposal(true, this, right, left, joiner);
        assert_eq!(hd.new_right, right);
        assert_eq!(hd.new_left, this);
        assert_eq!(hd.new_left2nd, left);
    }

    #[test]
    fn hello_from_lonely_node_proposes_two_node_ring() {
        let (this, joiner) = (addr(1), addr(9));
        let hd = hello_proposal(false, this, Addr::zero(), Addr::zero(), joiner);
        assert_eq!(hd.new_right, this);
        assert_eq!(hd.new_left, this);
        assert_eq!(hd.new_left2nd, joiner);
    }

    #[test]
    fn joining_a_lonely_node_closes_the_pair() {
        // B joins A; both ended up pointing at each other, and each
        // node's left2nd is itself.
        let (a, b) = (addr(1), addr(2));
        let hd = hello_proposal(false, a, Addr::zero(), Addr::zero(), b);
        let updates = join_updates(b, a, &hd);
        assert_eq!(updates.len(), 1);
        let (to, ud) = updates[0];
        assert_eq!(to, a);
        assert_eq!(ud.right, b);
        assert_eq!(ud.left, b);
        assert_eq!(ud.left2nd, a);
    }

    #[test]
    fn joining_a_doublet_updates_both_members() {
        // C joins the pair (A, B) through A's HELLO: ring A -> C -> A's
        // old left B. A's proposal names the same node as right and
        // left2nd, which is the doublet signature.
        let (a, b, c) = (addr(1), addr(2), addr(3));
        let hd = HelloData {
            new_right: b,
            new_left: a,
            new_left2nd: b,
        };
        let updates = join_updates(c, a, &hd);
        assert_eq!(updates.len(), 2);

        let (to_right, ud_right) = updates[0];
        assert_eq!(to_right, b);
        assert_eq!(ud_right.left, c);
        assert_eq!(ud_right.left2nd, a);
        assert!(ud_right.right.is_zero());

        let (to_left, ud_left) = updates[1];
        assert_eq!(to_left, a);
        assert_eq!(ud_left.right, c);
        assert_eq!(ud_left.left2nd, c);
        assert!(ud_left.left.is_zero());
    }

    #[test]
    fn joining_a_full_ring_splices_between_two_nodes() {
        let (a, b, d) = (addr(1), addr(2), addr(4));
        let joiner = addr(9);
        // Joining through B, whose right is A and left is D.
        let hd = HelloData {
            new_right: a,
            new_left: b,
            new_left2nd: d,
        };
        let updates = join_updates(joiner, b, &hd);
        assert_eq!(updates.len(), 2);

        let (to_right, ud_right) = updates[0];
        assert_eq!(to_right, a);
        assert_eq!(ud_right.left, joiner);
        assert_eq!(ud_right.left2nd, b);

        let (to_left, ud_left) = updates[1];
        assert_eq!(to_left, b);
        assert_eq!(ud_left.right, joiner);
        assert!(ud_left.left.is_zero());
        assert!(ud_left.left2nd.is_zero());
    }

    #[test]
    fn control_data_round_trips() {
        let hd = HelloData {
            new_right: addr(1),
            new_left: addr(2),
            new_left2nd: addr(3),
        };
        assert_eq!(HelloData::unpack(&hd.pack()), Some(hd));
        assert_eq!(HelloData::unpack(&[0; 47]), None);

        let ud = UpdateData {
            right: addr(4),
            left: Addr::zero(),
            left2nd: addr(5),
        };
        assert_eq!(UpdateData::unpack(&ud.pack()), Some(ud));

        let kd = KickData {
            dead_node: addr(6),
            sender_node: addr(7),
        };
        assert_eq!(KickData::unpack(&kd.pack()), Some(kd));
        assert_eq!(KickData::unpack(&[0; 16]), None);
    }
}
