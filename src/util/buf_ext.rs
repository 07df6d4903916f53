use anyhow::anyhow;
use bytes::{Buf, BufMut};
use std::mem::size_of;

/// Byte order of the multi-byte fields in a datagram. The sender announces the order it used in
///  the header flags, and receivers swap if it differs from what they would have used.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

macro_rules! get_try_impl {
    ($try_getter: ident, $ty:ty, $getter: ident) => {
        fn $try_getter(&mut self) -> anyhow::Result<$ty> {
            if self.remaining() < size_of::<$ty>() {
                return Err(anyhow!("buffer underflow"));
            }
            Ok(self.$getter())
        }
    }
}

pub trait BufExt: Buf {
    get_try_impl!(try_get_u8_checked, u8, get_u8);
    get_try_impl!(try_get_u64_be_checked, u64, get_u64);
    get_try_impl!(try_get_u64_le_checked, u64, get_u64_le);

    fn try_get_u64_ordered(&mut self, byte_order: ByteOrder) -> anyhow::Result<u64> {
        match byte_order {
            ByteOrder::Big => self.try_get_u64_be_checked(),
            ByteOrder::Little => self.try_get_u64_le_checked(),
        }
    }
}
impl <T: Buf> BufExt for T {}

pub trait BufMutExt: BufMut {
    fn put_u64_ordered(&mut self, value: u64, byte_order: ByteOrder) {
        match byte_order {
            ByteOrder::Big => self.put_u64(value),
            ByteOrder::Little => self.put_u64_le(value),
        }
    }
}
impl <T: BufMut> BufMutExt for T {}
