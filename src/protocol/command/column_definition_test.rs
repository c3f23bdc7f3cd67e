use std::mem::size_of;

use zerocopy::FromBytes;

use crate::constant::{ColumnFlags, ColumnType};
use crate::error::Error;
use crate::protocol::command::{ColumnDefinition, ColumnDefinitionBytes, ColumnDefinitionTail};
use crate::protocol::primitive::{write_int_1, write_int_lenenc, write_string_lenenc};

fn definition_packet(fixed_len: u64, tail: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for s in ["def", "test", "users", "users", "id", "id"] {
        write_string_lenenc(&mut out, s);
    }
    write_int_lenenc(&mut out, fixed_len);
    out.extend_from_slice(tail);
    out
}

const ID_TAIL: [u8; 12] = [
    0x3f, 0x00, // charset = 63 (binary)
    0x0B, 0x00, 0x00, 0x00, // column_length = 11
    0x03, // LONG
    0x03, 0x02, // NOT_NULL | PRI_KEY | AUTO_INCREMENT
    0x00, // decimals
    0x00, 0x00, // reserved
];

#[test]
fn tail_is_twelve_bytes() {
    assert_eq!(size_of::<ColumnDefinitionTail>(), 12);
}

#[test]
fn tail_parsing() {
    let data: [u8; 12] = [
        0x21, 0x00, // charset = 33
        0xFF, 0x00, 0x00, 0x00, // column_length = 255
        0xFD, // VAR_STRING
        0x00, 0x00, // flags
        0x00, // decimals
        0x00, 0x00, // reserved
    ];

    let tail = ColumnDefinitionTail::ref_from_bytes(&data).unwrap();
    assert_eq!(tail.charset(), 33);
    assert_eq!(tail.column_length(), 255);
    assert_eq!(tail.decimals(), 0);
    assert!(tail.flags().is_empty());
    assert_eq!(tail.column_type().unwrap(), ColumnType::MYSQL_TYPE_VAR_STRING);
}

#[test]
fn tail_flags() {
    let data: [u8; 12] = [
        0x21, 0x00, 0xFF, 0x00, 0x00, 0x00, //
        0x01, // TINY
        0x21, 0x00, // NOT_NULL | UNSIGNED
        0x00, 0x00, 0x00,
    ];

    let tail = ColumnDefinitionTail::ref_from_bytes(&data).unwrap();
    let flags = tail.flags();
    assert!(flags.contains(ColumnFlags::NOT_NULL_FLAG));
    assert!(flags.contains(ColumnFlags::UNSIGNED_FLAG));
    assert!(!flags.contains(ColumnFlags::AUTO_INCREMENT_FLAG));
    assert_eq!(tail.column_type().unwrap(), ColumnType::MYSQL_TYPE_TINY);
}

#[test]
fn unknown_flag_bits_are_dropped() {
    let mut data = ID_TAIL;
    // 0x4000 is not a known column flag
    data[8] = 0x42;
    let tail = ColumnDefinitionTail::ref_from_bytes(&data).unwrap();
    assert_eq!(
        tail.flags(),
        ColumnFlags::NOT_NULL_FLAG | ColumnFlags::PRI_KEY_FLAG | ColumnFlags::AUTO_INCREMENT_FLAG
    );
}

#[test]
fn invalid_column_type() {
    let mut data = ID_TAIL;
    data[6] = 0x50;
    let tail = ColumnDefinitionTail::ref_from_bytes(&data).unwrap();
    assert!(matches!(tail.column_type(), Err(Error::LibraryBug(_))));
}

#[test]
fn try_from_full_packet() {
    let packet = definition_packet(0x0c, &ID_TAIL);
    let col = ColumnDefinition::try_from(ColumnDefinitionBytes(&packet)).unwrap();

    assert_eq!(col.schema, b"test");
    assert_eq!(col.table_alias, b"users");
    assert_eq!(col.table_original, b"users");
    assert_eq!(col.name_alias, b"id");
    assert_eq!(col.name_original, b"id");
    assert_eq!(col.tail.charset(), 63);
    assert_eq!(col.tail.column_length(), 11);
    assert_eq!(col.tail.column_type().unwrap(), ColumnType::MYSQL_TYPE_LONG);
    assert!(col.tail.flags().contains(ColumnFlags::PRI_KEY_FLAG));
}

#[test]
fn bad_fixed_length_marker() {
    let packet = definition_packet(0x0b, &ID_TAIL);
    assert!(matches!(
        ColumnDefinition::try_from(ColumnDefinitionBytes(&packet)),
        Err(Error::InvalidPacket)
    ));
}

#[test]
fn truncated_tail() {
    let mut packet = definition_packet(0x0c, &ID_TAIL);
    packet.pop();
    assert!(matches!(
        ColumnDefinition::try_from(ColumnDefinitionBytes(&packet)),
        Err(Error::InvalidPacket)
    ));
}

#[test]
fn trailing_default_value_is_rejected() {
    let mut packet = definition_packet(0x0c, &ID_TAIL);
    write_int_1(&mut packet, 0x00);
    assert!(ColumnDefinition::try_from(ColumnDefinitionBytes(&packet)).is_err());
}
