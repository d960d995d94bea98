use std::io;
use std::net::{self, UdpSocket};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::warn;
use socket2::{Domain, Protocol, Socket, Type};

use crate::addr::Addr;
use crate::message::MAX_PAYLOAD_LENGTH;

pub struct UdpMessage {
    pub from: Addr,
    pub to: Addr,
    pub payload: Vec<u8>,
}

/// One UDP socket shared by the whole node. Sending and receiving each
/// run on their own thread; the rest of the overlay only ever touches
/// the channels.
pub struct UdpService {
    send_tx: Sender<UdpMessage>,
    pub receive_rx: Receiver<UdpMessage>,
}

fn new_socket(port: u16) -> io::Result<UdpSocket> {
    let sock = Socket::new(Domain::ipv4(), Type::dgram(), Some(Protocol::udp()))?;
    sock.set_broadcast(true)?;
    sock.set_reuse_address(true)?;
    let local_addr = net::SocketAddr::from(([0, 0, 0, 0], port));
    sock.bind(&local_addr.into())?;
    Ok(sock.into_udp_socket())
}

impl UdpService {
    pub fn init(port: u16) -> io::Result<UdpService> {
        let receive_socket = new_socket(port)?;
        let send_socket = receive_socket.try_clone()?;

        let (send_tx, send_rx) = bounded::<UdpMessage>(1);
        let (receive_tx, receive_rx) = bounded::<UdpMessage>(1);

        thread::spawn(move || receive_loop(receive_socket, receive_tx));
        thread::spawn(move || send_loop(send_socket, send_rx, port));

        Ok(UdpService {
            send_tx,
            receive_rx,
        })
    }

    pub fn send(&self, umsg: UdpMessage) {
        self.send_tx.send(umsg).ok();
    }
}

fn receive_loop(socket: UdpSocket, receive_tx: Sender<UdpMessage>) {
    let mut buf = [0; MAX_PAYLOAD_LENGTH];
    loop {
        match socket.recv_from(&mut buf) {
            Ok((0, _)) => continue,
            Ok((n, raddr)) => {
                let umsg = UdpMessage {
                    from: Addr::from(raddr.ip()),
                    to: Addr::zero(),
                    payload: buf[..n].to_vec(),
                };
                if receive_tx.send(umsg).is_err() {
                    return;
                }
            }
            Err(e) => warn!("udp receive failed: {}", e),
        }
    }
}

fn send_loop(socket: UdpSocket, send_rx: Receiver<UdpMessage>, port: u16) {
    for umsg in send_rx.iter() {
        if let Err(e) = socket.send_to(&umsg.payload, (umsg.to.ip(), port)) {
            warn!("udp send to {} failed: {}", umsg.to, e);
        }
    }
}
