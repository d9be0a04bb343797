//! Hex-and-transcript dumps for binary payloads.
//!
//! Output layout, with the address column and the offsets header enabled:
//!
//! ```text
//!       00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F
//! 0000  48 65 6C 6C 6F 00 77 6F 72 6C 64 21 0A 00 00 FF  Hello.world!....
//! 0010  01 02                                            ..
//! ```
//!
//! The address column is sized to cover the last dumped address, rounded
//! up to an even number of nibbles. The transcript substitutes a
//! configurable character for anything that is not printable ASCII.

use crate::error::{Error, Result};

/// Formatting options for [`dump`].
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Bytes rendered per row.
    pub bytes_per_row: usize,
    /// Whether to emit a header line of per-column offsets.
    pub show_offsets: bool,
    /// Whether to emit the leading address column.
    pub show_address: bool,
    /// Character substituted in the transcript for non-printable bytes.
    pub substitute: char,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            bytes_per_row: 16,
            show_offsets: true,
            show_address: true,
            substitute: '.',
        }
    }
}

/// Renders `length` bytes of `data` starting at `offset`.
///
/// Lengths exceeding the available data are clamped silently. Fails with
/// `InvalidArg` when the offset lies past the data, the length is zero, or
/// the row width is zero.
pub fn dump(data: &[u8], offset: usize, length: usize, options: &DumpOptions) -> Result<String> {
    if offset > data.len() {
        return Err(Error::InvalidArg(format!(
            "offset {} past data of {} bytes",
            offset,
            data.len()
        )));
    }
    if length == 0 {
        return Err(Error::InvalidArg("length must be positive".to_string()));
    }
    if options.bytes_per_row == 0 {
        return Err(Error::InvalidArg("bytes_per_row must be positive".to_string()));
    }

    let length = length.min(data.len() - offset);
    let slice = &data[offset..offset + length];
    let last_address = offset + length.saturating_sub(1);
    let addr_width = address_width(last_address);
    let hex_width = options.bytes_per_row * 3 - 1;

    let mut out = String::new();
    if options.show_offsets {
        if options.show_address {
            out.push_str(&" ".repeat(addr_width + 2));
        }
        let columns: Vec<String> = (0..options.bytes_per_row)
            .map(|i| format!("{:02X}", i % 256))
            .collect();
        out.push_str(&columns.join(" "));
        out.push('\n');
    }

    for (row, chunk) in slice.chunks(options.bytes_per_row).enumerate() {
        if options.show_address {
            let address = offset + row * options.bytes_per_row;
            out.push_str(&format!("{:0width$X}  ", address, width = addr_width));
        }
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        out.push_str(&format!("{:<width$}", hex.join(" "), width = hex_width));
        out.push_str("  ");
        for &b in chunk {
            out.push(transcript_char(b, options.substitute));
        }
        out.push('\n');
    }
    Ok(out)
}

fn transcript_char(b: u8, substitute: char) -> char {
    if (0x20..=0x7E).contains(&b) {
        b as char
    } else {
        substitute
    }
}

/// Nibbles needed to render `last`, rounded up to an even count.
fn address_width(last: usize) -> usize {
    let mut width = 1;
    let mut value = last;
    while value >= 16 {
        value /= 16;
        width += 1;
    }
    width + width % 2
}
