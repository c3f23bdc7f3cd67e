//! Scripted server side of a connection, for tests without a database.
#![allow(dead_code)]

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::Duration;

use zero_rowproc::Opts;
use zero_rowproc::protocol::packet::write_packets;
use zero_rowproc::protocol::primitive::{
    write_int_1, write_int_2, write_int_4, write_int_lenenc, write_string_lenenc,
};
use zero_rowproc::sync::Conn;

pub fn opts() -> Opts {
    Opts {
        poll_interval: Some(Duration::from_millis(50)),
        read_chunk_size: 4096,
        ..Opts::default()
    }
}

/// Route tracing output to the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A connection and the peer socket standing in for the server
pub fn conn_pair() -> (Conn, UnixStream) {
    init_tracing();
    let (client, server) = UnixStream::pair().unwrap();
    let conn = Conn::from_unix(client, opts()).unwrap();
    (conn, server)
}

/// Read one COM_QUERY from the client and return its SQL.
pub fn read_query(peer: &mut impl Read) -> String {
    let mut payload = Vec::new();
    loop {
        let mut header = [0u8; 4];
        peer.read_exact(&mut header).unwrap();
        let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
        let start = payload.len();
        payload.resize(start + len, 0);
        peer.read_exact(&mut payload[start..]).unwrap();
        if len < 0xFF_FFFF {
            break;
        }
    }
    assert_eq!(payload[0], 0x03, "expected COM_QUERY");
    String::from_utf8(payload[1..].to_vec()).unwrap()
}

/// Builder for the server's response to one query
pub struct Response {
    buf: Vec<u8>,
    seq: u8,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            seq: 1,
        }
    }

    fn packet(mut self, payload: &[u8]) -> Self {
        self.seq = write_packets(&mut self.buf, payload, self.seq);
        self
    }

    fn ok_payload(header: u8, affected_rows: u64, more: bool) -> Vec<u8> {
        let mut p = Vec::new();
        write_int_1(&mut p, header);
        write_int_lenenc(&mut p, affected_rows);
        write_int_lenenc(&mut p, 0);
        write_int_2(&mut p, if more { 0x000A } else { 0x0002 });
        write_int_2(&mut p, 0);
        p
    }

    /// OK packet of a statement without a resultset
    pub fn ok(self, affected_rows: u64, more: bool) -> Self {
        let p = Self::ok_payload(0x00, affected_rows, more);
        self.packet(&p)
    }

    /// Column count and one VARCHAR definition per name
    pub fn columns(mut self, names: &[&str]) -> Self {
        let mut count = Vec::new();
        write_int_lenenc(&mut count, names.len() as u64);
        self = self.packet(&count);
        for &name in names {
            let mut p = Vec::new();
            for s in ["def", "test", "t", "t", name, name] {
                write_string_lenenc(&mut p, s);
            }
            write_int_lenenc(&mut p, 0x0c);
            write_int_2(&mut p, 33);
            write_int_4(&mut p, 255);
            write_int_1(&mut p, 0xFD);
            write_int_2(&mut p, 0);
            write_int_1(&mut p, 0);
            write_int_2(&mut p, 0);
            self = self.packet(&p);
        }
        self
    }

    pub fn row(self, values: &[Option<&str>]) -> Self {
        let mut p = Vec::new();
        for value in values {
            match value {
                Some(v) => write_string_lenenc(&mut p, v),
                None => write_int_1(&mut p, 0xFB),
            }
        }
        self.packet(&p)
    }

    pub fn raw_row(self, payload: &[u8]) -> Self {
        self.packet(payload)
    }

    /// Single-column rows `prefix0`, `prefix1`, ...
    pub fn numbered_rows(mut self, prefix: &str, n: usize) -> Self {
        for i in 0..n {
            let value = format!("{prefix}{i}");
            self = self.row(&[Some(value.as_str())]);
        }
        self
    }

    /// OK-as-EOF terminating a resultset
    pub fn eof(self, more: bool) -> Self {
        let p = Self::ok_payload(0xFE, 0, more);
        self.packet(&p)
    }

    pub fn err(self, code: u16, message: &str) -> Self {
        let mut p = Vec::new();
        write_int_1(&mut p, 0xFF);
        write_int_2(&mut p, code);
        p.extend_from_slice(b"#HY000");
        p.extend_from_slice(message.as_bytes());
        self.packet(&p)
    }

    /// Packet with an explicit sequence id
    pub fn out_of_order(mut self, seq: u8, payload: &[u8]) -> Self {
        write_packets(&mut self.buf, payload, seq);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Response of a one-column query returning `rows`
pub fn rows_response(rows: &[&str]) -> Response {
    let mut response = Response::new().columns(&["c"]);
    for &row in rows {
        response = response.row(&[Some(row)]);
    }
    response.eof(false)
}

/// Serve from another thread: read the query, then write `bytes` in `chunk`
/// sized pieces with a short pause between them. Returns the SQL received.
pub fn serve_chunked(
    mut peer: UnixStream,
    bytes: Vec<u8>,
    chunk: usize,
) -> thread::JoinHandle<(String, UnixStream)> {
    thread::spawn(move || {
        let sql = read_query(&mut peer);
        for piece in bytes.chunks(chunk) {
            peer.write_all(piece).unwrap();
            thread::sleep(Duration::from_micros(200));
        }
        (sql, peer)
    })
}
