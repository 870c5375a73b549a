//! Dirty-range tracking for partial attribute uploads.
//!
//! Every pool keeps an [`UploadTracker`]. Allocation records how many slots
//! were written; [`UploadTracker::flush`] turns that into the slot spans that
//! changed since the previous flush:
//!
//! ```text
//! last <= cursor          last > cursor (wrapped)
//! [....|######|....]      [####|......|####]
//!      last   cursor           cursor last
//! ```
//!
//! Only those spans of each attribute array are written to the GPU, so the
//! upload cost follows the emission rate rather than the pool capacity.

use std::ops::Range;

/// One of the parallel per-slot attribute arrays of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Emission transform, a column-major 4x4 matrix.
    Transform,
    /// RGB color at birth.
    ColorStart,
    /// RGB color at death.
    ColorEnd,
    /// Travel axis.
    Direction,
    /// Scalar speed.
    Speed,
    /// Angular velocity per axis.
    RotationSpeed,
    /// `(birth_time, duration)`.
    Lifetime,
}

impl Attribute {
    /// Every attribute, in vertex-buffer order.
    pub const ALL: [Attribute; 7] = [
        Attribute::Transform,
        Attribute::ColorStart,
        Attribute::ColorEnd,
        Attribute::Direction,
        Attribute::Speed,
        Attribute::RotationSpeed,
        Attribute::Lifetime,
    ];

    /// Number of `f32` values stored per slot.
    pub const fn floats_per_slot(self) -> usize {
        match self {
            Attribute::Transform => 16,
            Attribute::ColorStart | Attribute::ColorEnd => 3,
            Attribute::Direction | Attribute::RotationSpeed => 3,
            Attribute::Speed => 1,
            Attribute::Lifetime => 2,
        }
    }

    /// Byte stride of one slot.
    pub const fn slot_bytes(self) -> usize {
        self.floats_per_slot() * std::mem::size_of::<f32>()
    }

    /// Debug label used for GPU buffers.
    pub const fn label(self) -> &'static str {
        match self {
            Attribute::Transform => "instance_transform",
            Attribute::ColorStart => "instance_color_start",
            Attribute::ColorEnd => "instance_color_end",
            Attribute::Direction => "instance_direction",
            Attribute::Speed => "instance_speed",
            Attribute::RotationSpeed => "instance_rotation_speed",
            Attribute::Lifetime => "instance_lifetime",
        }
    }
}

/// A run of consecutive slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First slot.
    pub offset: usize,
    /// Number of slots.
    pub len: usize,
}

impl Span {
    /// Span covering `start..end`.
    pub fn from_range(range: Range<usize>) -> Self {
        Self {
            offset: range.start,
            len: range.end.saturating_sub(range.start),
        }
    }

    /// One past the last slot.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Slot indices as a range.
    pub fn slots(&self) -> Range<usize> {
        self.offset..self.end()
    }

    /// Byte range of this span within an attribute array.
    pub fn bytes(&self, attribute: Attribute) -> Range<u64> {
        let stride = attribute.slot_bytes() as u64;
        (self.offset as u64 * stride)..(self.end() as u64 * stride)
    }
}

/// Slots changed since the previous flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirtyRange {
    /// Nothing was written.
    #[default]
    Clean,
    /// A single span, `[last_cursor, cursor)` or the whole pool.
    Contiguous(Span),
    /// The cursor wrapped: `head` is `[0, cursor)`, `tail` is `[last_cursor, capacity)`.
    Wrapped {
        /// Span at the start of the buffer.
        head: Span,
        /// Span at the end of the buffer.
        tail: Span,
    },
}

impl DirtyRange {
    /// The one or two spans that need uploading.
    pub fn spans(&self) -> impl Iterator<Item = Span> {
        let (a, b) = match *self {
            DirtyRange::Clean => (None, None),
            DirtyRange::Contiguous(span) => (Some(span), None),
            DirtyRange::Wrapped { head, tail } => (Some(head), Some(tail)),
        };
        a.into_iter().chain(b)
    }

    /// Total number of dirty slots.
    pub fn slot_count(&self) -> usize {
        self.spans().map(|s| s.len).sum()
    }

    /// Whether nothing needs uploading.
    pub fn is_clean(&self) -> bool {
        matches!(self, DirtyRange::Clean)
    }

    /// Whether `slot` is inside one of the spans.
    pub fn contains(&self, slot: usize) -> bool {
        self.spans().any(|s| s.slots().contains(&slot))
    }

    /// Byte ranges of `attribute` to upload.
    pub fn byte_ranges(&self, attribute: Attribute) -> impl Iterator<Item = Range<u64>> {
        self.spans().map(move |s| s.bytes(attribute))
    }
}

/// Remembers the cursor at the last flush and how much was written since.
#[derive(Debug, Clone, Default)]
pub struct UploadTracker {
    last_cursor: usize,
    written: usize,
}

impl UploadTracker {
    /// Fresh tracker with nothing dirty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor value as of the previous flush.
    pub fn last_cursor(&self) -> usize {
        self.last_cursor
    }

    /// Note that `count` slots were written since the last flush.
    pub fn record(&mut self, count: usize) {
        self.written = self.written.saturating_add(count);
    }

    /// Force the next flush to report the whole pool.
    pub fn mark_all(&mut self, capacity: usize) {
        self.written = self.written.max(capacity);
    }

    /// Compute the dirty spans and start tracking from `cursor`.
    pub fn flush(&mut self, cursor: usize, capacity: usize) -> DirtyRange {
        let last = self.last_cursor;
        let written = self.written;
        self.last_cursor = cursor;
        self.written = 0;

        if written == 0 {
            DirtyRange::Clean
        } else if written >= capacity {
            // A full lap leaves cursor == last, which looks clean otherwise.
            DirtyRange::Contiguous(Span::from_range(0..capacity))
        } else if last <= cursor {
            DirtyRange::Contiguous(Span::from_range(last..cursor))
        } else if cursor == 0 {
            DirtyRange::Contiguous(Span::from_range(last..capacity))
        } else {
            DirtyRange::Wrapped {
                head: Span::from_range(0..cursor),
                tail: Span::from_range(last..capacity),
            }
        }
    }
}
