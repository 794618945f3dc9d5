use std::io;

/// Types that can be written as a single frame.
pub trait Serialize<'a> {
    /// Writes the owned part of the frame into `buf`.
    ///
    /// # Returns
    /// An optional borrowed tail that is written right after `buf` without being copied.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}

/// Types that can be rebuilt from the body of a received frame, possibly
/// borrowing from it.
pub trait Deserialize<'a>: Sized {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}
