use binrw::BinWrite;
use bytes::Bytes;

use crate::macho::{encode, CommandArea, ModeFlags};
use crate::window::{ByteWindow, Endianness};

/// Where [`command_area`] places the first command, standing in for a
/// `mach_header_64`.
pub const AREA_OFFSET: u64 = 32;

pub fn encoded<T>(value: &T) -> Vec<u8>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    encode(value, Endianness::Little).unwrap()
}

pub fn command_area(records: Vec<Vec<u8>>, count: Option<u32>, mode: ModeFlags) -> CommandArea {
    command_area_with(records, count, mode, Endianness::Little)
}

pub fn command_area_with(
    records: Vec<Vec<u8>>,
    count: Option<u32>,
    mode: ModeFlags,
    order: Endianness,
) -> CommandArea {
    let mut blob = vec![0xFEu8; AREA_OFFSET as usize];
    for record in &records {
        blob.extend_from_slice(record);
    }
    let len = blob.len() as u64 - AREA_OFFSET;
    let window = ByteWindow::over(&Bytes::from(blob), AREA_OFFSET, len, order).unwrap();
    CommandArea::new(window, count, mode)
}
