//! Modbus TCP server.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};

use crate::frame::{Exception, FunctionCode, Request, Response};
use crate::handler::Handler;

type Registry = HashMap<FunctionCode, Box<dyn Handler>>;

/// A Modbus server listening on a TCP port.
///
/// Incoming requests are dispatched by function code to the registered
/// [`Handler`]s. Every accepted connection is served by its own thread;
/// within one connection requests are answered strictly in order, one
/// response per request.
pub struct Server {
    listener: TcpListener,
    handlers: Registry,
    timeout: Option<Duration>,
}

impl Server {
    /// Bind a new server to the given address.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Server {
            listener,
            handlers: HashMap::new(),
            timeout: None,
        })
    }

    /// The address the server is bound to.
    ///
    /// Useful after binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Set the read timeout applied to every connection accepted from now
    /// on. `None` means reads block until the peer sends data or closes.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Register the handler for the given function code.
    ///
    /// A later registration for the same code replaces the earlier one.
    /// Requests for codes without a handler are answered with an
    /// IllegalFunction exception.
    pub fn handle<H>(&mut self, code: FunctionCode, handler: H)
    where
        H: Handler + 'static,
    {
        self.handlers.insert(code, Box::new(handler));
    }

    /// Start accepting and serving connections. Never returns.
    ///
    /// Consuming the server freezes the handler registry: workers share it
    /// read-only, so all registration has to happen before this call.
    pub fn listen(self) {
        let handlers = Arc::new(self.handlers);
        loop {
            let stream = match self.listener.accept() {
                Ok((stream, _)) => stream,
                Err(err) => {
                    log::error!("failed to accept incoming connection: {err}");
                    continue;
                }
            };
            if let Err(err) = stream.set_read_timeout(self.timeout) {
                log::error!("failed to apply read timeout: {err}");
            }
            let handlers = Arc::clone(&handlers);
            thread::spawn(move || {
                let peer = stream.peer_addr();
                if let Err(err) = serve_conn(&handlers, stream) {
                    match peer {
                        Ok(peer) => log::error!("unable to handle request from {peer}: {err}"),
                        Err(_) => log::error!("unable to handle request: {err}"),
                    }
                }
                // the connection is dropped, and thereby closed, here on
                // every exit path
            });
        }
    }
}

/// Serve framed requests from one connection until the peer goes away.
///
/// Returns `Ok(())` when the peer closes the connection at a message
/// boundary. Read failures, malformed frames and response-write failures
/// end the connection with an error.
fn serve_conn<S: Read + Write>(handlers: &Registry, mut stream: S) -> io::Result<()> {
    loop {
        let Some(frame) = read_message(&mut stream)? else {
            return Ok(());
        };
        let req = Request::try_from(&frame[..])
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        execute(handlers, &mut stream, &req)?;
    }
}

/// Read one complete framed message.
///
/// The 6-byte prefix carries the length field, which tells how many bytes
/// follow it; the returned buffer holds the whole message. `None` means
/// the peer closed the connection before sending a new message.
fn read_message(r: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 6];
    let mut filled = 0;
    while filled < prefix.len() {
        match r.read(&mut prefix[filled..])? {
            0 if filled == 0 => return Ok(None),
            0 => return Err(io::ErrorKind::UnexpectedEof.into()),
            n => filled += n,
        }
    }

    let length = BigEndian::read_u16(&prefix[4..6]);
    let mut frame = vec![0u8; 6 + usize::from(length)];
    frame[..6].copy_from_slice(&prefix);
    r.read_exact(&mut frame[6..])?;

    Ok(Some(frame))
}

/// Dispatch a request to its handler and write exactly one response.
///
/// A function code without a registered handler is answered with an
/// IllegalFunction exception.
fn execute(handlers: &Registry, w: &mut dyn Write, req: &Request) -> io::Result<()> {
    let handler = FunctionCode::new(req.function).and_then(|code| handlers.get(&code));
    match handler {
        Some(handler) => handler.serve(w, req),
        None => {
            let resp = Response::exception(req, Exception::IllegalFunction);
            w.write_all(&resp.encode())
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::frame::Header;
    use std::io::Cursor;

    #[test]
    fn read_message_frames_by_length_field() {
        let data = [
            0x00, // transaction id
            0x2A, // transaction id
            0x00, // protocol id
            0x00, // protocol id
            0x00, // length
            0x04, // length
            0x12, // unit id
            0x06, // function code
            0x22, // addr
            0x22, // addr
            0xFF, // next message
        ];
        let msg = read_message(&mut Cursor::new(&data)).unwrap().unwrap();
        assert_eq!(msg, data[..10]);
    }

    #[test]
    fn read_message_zero_length() {
        let data = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let msg = read_message(&mut Cursor::new(&data)).unwrap().unwrap();
        assert_eq!(msg, data);
    }

    #[test]
    fn read_message_clean_end_of_stream() {
        assert!(read_message(&mut Cursor::new(&[])).unwrap().is_none());
    }

    #[test]
    fn read_message_truncated_prefix() {
        for len in 1..6 {
            let data = vec![0u8; len];
            let err = read_message(&mut Cursor::new(&data)).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        }
    }

    #[test]
    fn read_message_truncated_body() {
        // length field claims 4 bytes, only 3 arrive
        let data = [0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01, 0x00];
        let err = read_message(&mut Cursor::new(&data)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    struct ErrorWriter;

    impl Write for ErrorWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("broken pipe"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct RawHandler<F>(F);

    impl<F> Handler for RawHandler<F>
    where
        F: Fn(&mut dyn Write, &Request) -> io::Result<()> + Send + Sync,
    {
        fn serve(&self, w: &mut dyn Write, req: &Request) -> io::Result<()> {
            self.0(w, req)
        }
    }

    fn request(function: u8) -> Request {
        Request {
            hdr: Header {
                transaction_id: 0,
                protocol_id: 0,
                length: 0,
                unit_id: 0,
            },
            function,
            data: Vec::new(),
        }
    }

    #[test]
    fn execute_unregistered_code_writes_illegal_function() {
        let handlers = Registry::new();
        let mut buf = Vec::new();
        execute(&handlers, &mut buf, &request(1)).unwrap();
        assert_eq!(buf, [0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x81, 0x01]);
    }

    #[test]
    fn execute_reports_writer_failure() {
        let handlers = Registry::new();
        assert!(execute(&handlers, &mut ErrorWriter, &request(1)).is_err());
    }

    #[test]
    fn execute_dispatches_to_registered_handler() {
        let mut handlers = Registry::new();
        handlers.insert(
            FunctionCode::ReadCoils,
            Box::new(RawHandler(|w: &mut dyn Write, req: &Request| {
                assert_eq!(req.function, 1);
                w.write_all(b"served")
            })),
        );

        let mut buf = Vec::new();
        execute(&handlers, &mut buf, &request(1)).unwrap();
        assert_eq!(buf, b"served");
    }

    /// An in-memory connection: reads from a canned byte stream, collects
    /// writes.
    struct Connection {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Connection {
        fn new(input: &[u8]) -> Self {
            Connection {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for Connection {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Connection {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn serve_conn_ends_cleanly_on_end_of_stream() {
        let handlers = Registry::new();
        let conn = Connection::new(&[]);
        assert!(serve_conn(&handlers, conn).is_ok());
    }

    #[test]
    fn serve_conn_answers_and_then_ends_cleanly() {
        let handlers = Registry::new();
        let mut conn = Connection::new(&[
            0x00, 0x00, 0x00, 0x00, 0x00, 0x04, // prefix, length 4
            0x00, // unit id
            0x2A, // unregistered function code
            0x00, 0x00, // payload
        ]);
        let result = serve_conn(&handlers, &mut conn);
        assert!(result.is_ok());
        assert_eq!(
            conn.output,
            [0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0xAA, 0x01]
        );
    }

    #[test]
    fn serve_conn_fails_on_truncated_message() {
        let handlers = Registry::new();
        let conn = Connection::new(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01]);
        assert!(serve_conn(&handlers, conn).is_err());
    }

    #[test]
    fn serve_conn_fails_on_write_failure() {
        struct WriteFailConnection(Cursor<Vec<u8>>);

        impl Read for WriteFailConnection {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                self.0.read(buf)
            }
        }
        impl Write for WriteFailConnection {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("broken pipe"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let handlers = Registry::new();
        let conn = WriteFailConnection(Cursor::new(vec![
            0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01,
        ]));
        assert!(serve_conn(&handlers, conn).is_err());
    }
}
