//! Resolution of built-in scalar type names (`u4le`, `s2`, `b12`, `f8`,
//! `str`, `strz`, raw bytes) into their encoding parameters.

/// How a built-in scalar is read from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Raw byte range; length comes from `size`, `size-eos` or `contents`.
    Bytes,
    /// Single bit read as a boolean (`b1`).
    Bool,
    /// Unaligned bit field of 2..=64 bits (`bN`); endian hint selects the
    /// bit order.
    Bits,
    Unsigned,
    Signed,
    Float,
    /// UTF-8 string sized like a byte range.
    Str,
    /// UTF-8 string read up to and consuming a null terminator.
    StrTerminated,
}

/// Endianness carried by a type-name suffix; `Current` defers to the
/// cursor's active setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndianHint {
    Current,
    Little,
    Big,
}

/// Encoding parameters for one resolved built-in name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    pub encoding: Encoding,
    /// Bits consumed by one read; 0 when the length is externally sized
    /// (bytes, strings).
    pub bit_size: u32,
    /// Whether the cursor skips to the next byte boundary before reading.
    pub byte_align: bool,
    pub endian: EndianHint,
}

fn fixed(encoding: Encoding, bit_size: u32, byte_align: bool, endian: EndianHint) -> Builtin {
    Builtin {
        encoding,
        bit_size,
        byte_align,
        endian,
    }
}

/// Resolves a built-in scalar type name. Returns `None` for user-defined
/// type names.
pub fn lookup(name: &str) -> Option<Builtin> {
    match name {
        "bytes" => return Some(fixed(Encoding::Bytes, 0, true, EndianHint::Current)),
        "str" => return Some(fixed(Encoding::Str, 0, true, EndianHint::Current)),
        "strz" => return Some(fixed(Encoding::StrTerminated, 0, true, EndianHint::Current)),
        _ => {}
    }

    let (base, endian) = match name {
        n if n.len() > 2 && n.ends_with("le") => (&n[..n.len() - 2], EndianHint::Little),
        n if n.len() > 2 && n.ends_with("be") => (&n[..n.len() - 2], EndianHint::Big),
        n => (n, EndianHint::Current),
    };

    let mut chars = base.chars();
    let kind = chars.next()?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: u32 = digits.parse().ok()?;

    match kind {
        'u' if (1..=8).contains(&n) => Some(fixed(Encoding::Unsigned, n * 8, true, endian)),
        's' if (1..=8).contains(&n) => Some(fixed(Encoding::Signed, n * 8, true, endian)),
        'f' if n == 4 || n == 8 => Some(fixed(Encoding::Float, n * 8, true, endian)),
        'b' if n == 1 => Some(fixed(Encoding::Bool, 1, false, endian)),
        'b' if (2..=64).contains(&n) => Some(fixed(Encoding::Bits, n, false, endian)),
        _ => None,
    }
}
