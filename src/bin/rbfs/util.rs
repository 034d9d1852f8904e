use anyhow::{anyhow, Context, Result};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Read;
use std::path::PathBuf;

use rebblestore::config::{parse_u32, StorageConfig};
use rebblestore::flash::ImageFlash;
use rebblestore::fs::Fs;

use crate::cli::DeviceArgs;

pub fn parse_num(s: &str) -> std::result::Result<u32, String> {
    parse_u32(s).ok_or_else(|| format!("not a number: {}", s))
}

pub fn storage_config(dev: &DeviceArgs) -> Result<StorageConfig> {
    let mut cfg = StorageConfig::from_env();
    if let Some(v) = dev.region_start {
        cfg = cfg.with_region_start(v);
    }
    if let Some(v) = dev.page_size {
        cfg = cfg.with_page_size(v);
    }
    if let Some(v) = dev.page_count {
        cfg = cfg.with_page_count(v);
    }
    if let Some(v) = dev.erase_size {
        cfg = cfg.with_erase_size(v);
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Mount the image. With `create`, a missing image is created erased.
pub fn mount(dev: &DeviceArgs, create: bool) -> Result<Fs> {
    let cfg = storage_config(dev)?;
    let len = cfg.region_start as u64 + cfg.region_len() as u64;
    let flash = if create {
        let len = u32::try_from(len).map_err(|_| anyhow!("image of {} bytes too large", len))?;
        ImageFlash::open_or_create(&dev.image, len)
    } else {
        ImageFlash::open(&dev.image)
    }
    .with_context(|| format!("open image {}", dev.image.display()))?;
    if (flash.len() as u64) < len {
        return Err(anyhow!(
            "image {} is {} bytes, geometry needs {}",
            dev.image.display(),
            flash.len(),
            len
        ));
    }
    Ok(Fs::mount(Box::new(flash), cfg)?)
}

/// Mount and insist on a usable filesystem.
pub fn mount_valid(dev: &DeviceArgs) -> Result<Fs> {
    let fs = mount(dev, false)?;
    if !fs.is_valid() {
        return Err(anyhow!(
            "{}: no valid filesystem (run `rbfs format`)",
            dev.image.display()
        ));
    }
    Ok(fs)
}

pub fn decode_value_arg(arg: &str) -> Result<Vec<u8>> {
    if arg == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }
    if let Some(p) = arg.strip_prefix('@') {
        let path = PathBuf::from(p);
        let mut f = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|e| anyhow!("open value file {}: {}", path.display(), e))?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        return Ok(buf);
    }
    if let Some(hx) = arg.strip_prefix("hex:") {
        return decode_hex(hx);
    }
    Ok(arg.as_bytes().to_vec())
}

/// Hex digits, optionally split by spaces or colons (`de:ad be ef`).
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = s
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(anyhow!("odd number of hex digits ({})", digits.len()));
    }
    digits
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(h), Some(l)) => Ok(h << 4 | l),
            _ => Err(anyhow!("bad hex byte #{}", i)),
        })
        .collect()
}

fn nibble(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

pub fn display_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if !s.chars().any(|c| c.is_control()) => s.to_string(),
        _ => format!("hex:{}", to_hex(bytes)),
    }
}

/// Offset, 16 bytes of hex, printable ASCII; one line per 16 bytes.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:06x}  {:<48}|", row * 16, hex_words(chunk));
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('|');
    }
    out
}

fn hex_words(chunk: &[u8]) -> String {
    chunk.iter().fold(String::new(), |mut acc, b| {
        let _ = write!(acc, "{:02x} ", b);
        acc
    })
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
        let _ = write!(acc, "{:02x}", b);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_accepts_separators() {
        assert_eq!(decode_hex("de:ad be EF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("+f").is_err());
        assert_eq!(to_hex(&[0x00, 0x7f]), "007f");
    }

    #[test]
    fn dump_rows_carry_offset_and_ascii() {
        let d = hex_dump(b"rebble store 0123456789");
        let rows: Vec<&str> = d.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("000000  72 65 62 62"));
        assert!(rows[0].ends_with("|rebble store 012|"));
        assert!(rows[1].starts_with("000010  33 34"));
        assert!(rows[1].ends_with("|3456789|"));
    }
}
