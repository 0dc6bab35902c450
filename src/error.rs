use core::alloc::Layout;
use core::fmt;

/// The error type for [`try_reserve`] methods.
///
/// [`try_reserve`]: crate::HashMap::try_reserve
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TryReserveError {
    /// The requested bucket count overflowed `usize` or the allocation size
    /// exceeded `isize::MAX` bytes.
    CapacityOverflow,

    /// The memory allocator returned an error.
    AllocError {
        /// The layout of the bucket array that could not be allocated.
        layout: Layout,
    },
}

impl fmt::Display for TryReserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryReserveError::CapacityOverflow => {
                f.write_str("hash table capacity exceeds the maximum bucket count")
            }
            TryReserveError::AllocError { layout } => write!(
                f,
                "failed to allocate {} bytes for the bucket array",
                layout.size()
            ),
        }
    }
}

impl core::error::Error for TryReserveError {}
