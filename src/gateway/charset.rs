use std::vec::Vec;

/// replacement for anything that has no single byte equivalent
pub const PLACEHOLDER: u8 = b'?';

/**
    convert utf-8 text to ISO-8859-15

    every character gives exactly one byte: ascii is unchanged, characters of the charset get their code, other characters and every invalid byte give [PLACEHOLDER]. Decoding resumes right after an invalid byte.
*/
pub fn to_latin9(text: &[u8]) -> Vec<u8> {
    let mut converted = Vec::with_capacity(text.len());
    let mut index = 0;
    while index < text.len() {
        let (byte, consumed) = decode(&text[index ..]);
        converted.push(byte);
        index += consumed;
    }
    converted
}

/// convert the character starting `text`, returns the converted byte and the number of bytes consumed
fn decode(text: &[u8]) -> (u8, usize) {
    let lead = text[0];
    let (length, initial, minimum) = match lead {
        0x00 ..= 0x7f => return (lead, 1),
        0xc2 ..= 0xdf => (2, u32::from(lead & 0x1f), 0x80),
        0xe0 ..= 0xef => (3, u32::from(lead & 0x0f), 0x800),
        0xf0 ..= 0xf4 => (4, u32::from(lead & 0x07), 0x10000),
        _ => return (PLACEHOLDER, 1),
    };
    let Some(continuation) = text.get(1 .. length)
        else {return (PLACEHOLDER, 1)};
    let mut point = initial;
    for &byte in continuation {
        if byte & 0xc0 != 0x80
            {return (PLACEHOLDER, 1)}
        point = point << 6 | u32::from(byte & 0x3f);
    }
    // overlong: the lead is invalid, continuation bytes are decoded on their own
    if point < minimum
        {return (PLACEHOLDER, 1)}
    (encode(point), length)
}

fn encode(point: u32) -> u8 {
    match point {
        // characters ISO-8859-15 added over latin-1
        0x20ac => 0xa4,
        0x0160 => 0xa6,
        0x0161 => 0xa8,
        0x017d => 0xb4,
        0x017e => 0xb8,
        0x0152 => 0xbc,
        0x0153 => 0xbd,
        0x0178 => 0xbe,
        // latin-1 characters they replaced
        0xa4 | 0xa6 | 0xa8 | 0xb4 | 0xb8 | 0xbc | 0xbd | 0xbe => PLACEHOLDER,
        0 ..= 0xff => point as u8,
        _ => PLACEHOLDER,
    }
}
