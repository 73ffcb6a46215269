#![allow(dead_code)]

use std::cell::RefCell;
use std::cmp::min;
use std::collections::VecDeque;
use std::io::{Error, ErrorKind};
use std::rc::Rc;

use mk312_proto::DeviceState;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serial port stand-in replaying a fixed script, one chunk per read.
pub struct SerialInterface {
    rx: VecDeque<Vec<u8>>,
    pub tx: Vec<u8>,
    do_read_error: bool,
    do_write_error: bool,
}

pub struct SerialIOPlane(Rc<RefCell<SerialInterface>>);

impl SerialIOPlane {
    pub fn new(serial_if: &Rc<RefCell<SerialInterface>>) -> SerialIOPlane {
        SerialIOPlane(serial_if.clone())
    }
}

impl SerialInterface {
    pub fn new(rx: &[&[u8]]) -> Rc<RefCell<SerialInterface>> {
        Rc::new(RefCell::new(SerialInterface {
            rx: rx.iter().map(|chunk| chunk.to_vec()).collect(),
            tx: Vec::new(),
            do_read_error: false,
            do_write_error: false,
        }))
    }

    pub fn push_rx(&mut self, chunk: &[u8]) {
        self.rx.push_back(chunk.to_vec());
    }

    pub fn take_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }

    pub fn trigger_write_error(&mut self) {
        self.do_write_error = true;
    }

    pub fn trigger_read_error(&mut self) {
        self.do_read_error = true;
    }
}

impl std::io::Read for SerialIOPlane {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut inner = self.0.borrow_mut();
        if inner.do_read_error {
            inner.do_read_error = false;
            return Err(Error::new(ErrorKind::BrokenPipe, "IO read error"));
        }
        match inner.rx.pop_front() {
            Some(mut chunk) => {
                let len = min(buf.len(), chunk.len());
                buf[..len].copy_from_slice(&chunk[..len]);
                if len < chunk.len() {
                    inner.rx.push_front(chunk.split_off(len));
                }
                Ok(len)
            }
            None => Err(Error::new(ErrorKind::TimedOut, "IO read timeout")),
        }
    }
}

impl std::io::Write for SerialIOPlane {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut inner = self.0.borrow_mut();
        if inner.do_write_error {
            inner.do_write_error = false;
            Err(Error::new(ErrorKind::BrokenPipe, "IO write error"))
        } else {
            inner.tx.extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

type LineT = Rc<RefCell<VecDeque<u8>>>;

/// One end of a point-to-point serial line.
pub struct LinkEnd {
    rx: LineT,
    tx: LineT,
    pub do_read_error: bool,
    pub do_write_error: bool,
}

/// Create a connected pair of line ends, host first.
pub fn serial_link() -> (LinkEnd, LinkEnd) {
    let to_device = LineT::default();
    let to_host = LineT::default();
    let host = LinkEnd::new(Rc::clone(&to_host), Rc::clone(&to_device));
    let device = LinkEnd::new(to_device, to_host);
    (host, device)
}

impl LinkEnd {
    fn new(rx: LineT, tx: LineT) -> LinkEnd {
        LinkEnd {
            rx,
            tx,
            do_read_error: false,
            do_write_error: false,
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.borrow().len()
    }
}

impl std::io::Read for LinkEnd {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.do_read_error {
            self.do_read_error = false;
            return Err(Error::new(ErrorKind::BrokenPipe, "IO read error"));
        }
        let mut rx = self.rx.borrow_mut();
        if rx.is_empty() {
            return Err(Error::new(ErrorKind::TimedOut, "IO read timeout"));
        }
        let len = min(buf.len(), rx.len());
        for (dst, src) in buf.iter_mut().zip(rx.drain(..len)) {
            *dst = src;
        }
        Ok(len)
    }
}

impl std::io::Write for LinkEnd {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.do_write_error {
            self.do_write_error = false;
            Err(Error::new(ErrorKind::BrokenPipe, "IO write error"))
        } else {
            self.tx.borrow_mut().extend(buf.iter().copied());
            Ok(buf.len())
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run the emulated box until it needs more data, accepting frames for which
/// `accept` returns true.
pub fn run_device(
    mut device: DeviceState,
    serial: &mut LinkEnd,
    accept: impl Fn(&mk312_proto::device::WriteChannel) -> bool,
) -> DeviceState {
    use std::io::{Read, Write};

    loop {
        device = match device {
            DeviceState::ReceiveData(recv) => {
                let mut buf = [0; 16];
                match serial.read(&mut buf) {
                    Ok(len) if len > 0 => recv.receive_data(&buf[..len]),
                    _ => return recv.into(),
                }
            }

            DeviceState::SendData(send) => {
                serial.write_all(send.get_data()).unwrap();
                send.data_sent()
            }

            DeviceState::WriteChannel(write) => {
                if accept(&write) {
                    write.write_ok()
                } else {
                    write.write_error()
                }
            }
        };
    }
}
