use std::io::Cursor;

use crate::BufferSet;

#[test]
fn new_buffer_set_is_empty() {
    let buffers = BufferSet::new();
    assert!(buffers.unread().is_empty());
    assert!(buffers.unsent().is_empty());
    assert_eq!(buffers.read_pos(), 0);
}

#[test]
fn fill_consume_compact() {
    let mut buffers = BufferSet::new();
    let mut src = Cursor::new(b"hello world".to_vec());

    assert_eq!(buffers.fill_from(&mut src, 5).unwrap(), 5);
    assert_eq!(buffers.unread(), b"hello");
    assert_eq!(buffers.fill_from(&mut src, 64).unwrap(), 6);
    assert_eq!(buffers.unread(), b"hello world");

    buffers.consume(6);
    assert_eq!(buffers.unread(), b"world");
    // parsed bytes stay addressable until compaction
    assert_eq!(&buffers.read_buffer[..5], b"hello");

    buffers.compact();
    assert_eq!(buffers.read_pos(), 0);
    assert_eq!(buffers.read_buffer, b"world");
}

#[test]
fn fill_at_eof_keeps_buffer() {
    let mut buffers = BufferSet::new();
    buffers.read_buffer.extend_from_slice(b"abc");
    let mut src = Cursor::new(Vec::new());
    assert_eq!(buffers.fill_from(&mut src, 16).unwrap(), 0);
    assert_eq!(buffers.read_buffer, b"abc");
}

#[test]
fn consume_is_clamped() {
    let mut buffers = BufferSet::new();
    buffers.read_buffer.extend_from_slice(b"abc");
    buffers.consume(10);
    assert!(buffers.unread().is_empty());
}

#[test]
fn partial_writes() {
    let mut buffers = BufferSet::new();
    buffers.write_buffer_mut().extend_from_slice(b"SELECT 1");

    buffers.advance_write(3);
    assert_eq!(buffers.unsent(), b"ECT 1");

    buffers.advance_write(5);
    assert!(buffers.unsent().is_empty());
    assert!(buffers.write_buffer_mut().is_empty());
}

#[test]
fn clear_keeps_capacity() {
    let mut buffers = BufferSet::new();
    buffers.read_buffer.extend_from_slice(b"test data");
    buffers.write_buffer_mut().extend_from_slice(b"query");
    buffers.consume(4);

    buffers.clear();
    assert!(buffers.unread().is_empty());
    assert!(buffers.unsent().is_empty());
    assert!(buffers.read_buffer.capacity() >= 9);
}
