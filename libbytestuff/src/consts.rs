//! Reserved marker bytes and the escape rule shared by stuffer and unstuffer.

use arrayvec::ArrayVec;


pub mod flags {
    /// Start of frame.
    pub const SOF: u8 = 0xA1;

    /// End of frame.
    pub const EOF: u8 = 0xA2;

    /// Escape, followed by the bitwise complement of the escaped byte.
    pub const ESC: u8 = 0xA3;
}

// an escaped byte must never look like a marker itself
const _: () = assert!(!is_marker(!flags::SOF) && !is_marker(!flags::EOF) && !is_marker(!flags::ESC));


/// Returns true if `byte` collides with one of the reserved markers and
/// therefore must be escaped in payload position.
pub const fn is_marker(byte: u8) -> bool {
    matches!(byte, flags::SOF | flags::EOF | flags::ESC)
}

/// On-wire representation of a single payload byte.
pub fn escape(byte: u8) -> ArrayVec<u8, 2> {
    let mut out = ArrayVec::new();

    if is_marker(byte) {
        out.push(flags::ESC);
        out.push(!byte);
    } else {
        out.push(byte);
    }

    out
}

/// Number of bytes `byte` occupies on the wire.
pub const fn escaped_len(byte: u8) -> usize {
    if is_marker(byte) { 2 } else { 1 }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_marker() {
        assert!(is_marker(0xA1));
        assert!(is_marker(0xA2));
        assert!(is_marker(0xA3));

        assert!(!is_marker(0x00));
        assert!(!is_marker(0xA0));
        assert!(!is_marker(0xA4));
        assert!(!is_marker(0xFF));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(0x00)[..], [0x00]);
        assert_eq!(escape(0x5E)[..], [0x5E]);
        assert_eq!(escape(0xFF)[..], [0xFF]);

        assert_eq!(escape(flags::SOF)[..], [0xA3, 0x5E]);
        assert_eq!(escape(flags::EOF)[..], [0xA3, 0x5D]);
        assert_eq!(escape(flags::ESC)[..], [0xA3, 0x5C]);

        for b in 0..=u8::MAX {
            assert_eq!(escape(b).len(), escaped_len(b));
        }
    }
}
