//! Segmented byte-addressed memory.
//!
//! Every allocation is its own segment. A pointer packs `segment + 1` into the
//! upper 32 bits and the byte offset into the lower 32, so zero is never a
//! valid address. Segments are never reused; accessing a freed one is
//! reported as use-after-free rather than silently aliasing.

use glint_ir::IrType;

use super::error::RuntimeError;
use super::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Stack,
    Heap,
    Global,
}

#[derive(Debug)]
struct Segment {
    kind: SegmentKind,
    bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct Memory {
    segments: Vec<Option<Segment>>,
    live_bytes: usize,
    limit: usize,
}

impl Memory {
    pub fn new(limit: usize) -> Self {
        Self {
            segments: Vec::new(),
            live_bytes: 0,
            limit,
        }
    }

    /// Allocate `size` zeroed bytes.
    pub fn alloc(&mut self, size: u32, kind: SegmentKind) -> Result<u64, RuntimeError> {
        let size = size as usize;
        if self.live_bytes + size > self.limit {
            return Err(RuntimeError::OutOfMemory(self.limit));
        }
        self.live_bytes += size;
        let index = self.segments.len() as u64;
        self.segments.push(Some(Segment {
            kind,
            bytes: vec![0; size],
        }));
        Ok((index + 1) << 32)
    }

    /// Release the segment starting at `ptr`.
    pub fn free(&mut self, ptr: u64) -> Result<(), RuntimeError> {
        let (index, offset) = split(ptr)?;
        if offset != 0 {
            return Err(RuntimeError::InvalidAddress(ptr));
        }
        let slot = self
            .segments
            .get_mut(index)
            .ok_or(RuntimeError::InvalidAddress(ptr))?;
        let segment = slot.take().ok_or(RuntimeError::UseAfterFree(ptr))?;
        self.live_bytes -= segment.bytes.len();
        Ok(())
    }

    pub fn read(&self, ptr: u64, ty: &IrType) -> Result<Value, RuntimeError> {
        let bytes = self.bytes(ptr, ty.size())?;
        Ok(Value::decode(ty, bytes))
    }

    pub fn write(&mut self, ptr: u64, ty: &IrType, value: &Value) -> Result<(), RuntimeError> {
        let bytes = self.bytes_mut(ptr, ty.size())?;
        value.encode(ty, bytes)
    }

    /// Advance `ptr` by `delta` bytes within its segment's address range.
    pub fn offset(ptr: u64, delta: i64) -> Result<u64, RuntimeError> {
        let (_, offset) = split(ptr)?;
        let moved = i64::from(offset) + delta;
        if !(0..=i64::from(u32::MAX)).contains(&moved) {
            return Err(RuntimeError::InvalidAddress(ptr));
        }
        Ok((ptr & !0xffff_ffff) | moved as u64)
    }

    pub fn live_segments(&self, kind: SegmentKind) -> usize {
        self.segments
            .iter()
            .flatten()
            .filter(|segment| segment.kind == kind)
            .count()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    fn segment(&self, ptr: u64) -> Result<&Segment, RuntimeError> {
        let (index, _) = split(ptr)?;
        match self.segments.get(index) {
            Some(Some(segment)) => Ok(segment),
            Some(None) => Err(RuntimeError::UseAfterFree(ptr)),
            None => Err(RuntimeError::InvalidAddress(ptr)),
        }
    }

    fn bytes(&self, ptr: u64, size: u32) -> Result<&[u8], RuntimeError> {
        let segment = self.segment(ptr)?;
        let range = range(ptr, size, segment.bytes.len())?;
        Ok(&segment.bytes[range])
    }

    fn bytes_mut(&mut self, ptr: u64, size: u32) -> Result<&mut [u8], RuntimeError> {
        let len = self.segment(ptr)?.bytes.len();
        let range = range(ptr, size, len)?;
        let (index, _) = split(ptr)?;
        match self.segments.get_mut(index) {
            Some(Some(segment)) => Ok(&mut segment.bytes[range]),
            _ => Err(RuntimeError::InvalidAddress(ptr)),
        }
    }
}

fn split(ptr: u64) -> Result<(usize, u32), RuntimeError> {
    let segment = ptr >> 32;
    if segment == 0 {
        return Err(RuntimeError::InvalidAddress(ptr));
    }
    Ok(((segment - 1) as usize, ptr as u32))
}

fn range(ptr: u64, size: u32, len: usize) -> Result<std::ops::Range<usize>, RuntimeError> {
    let start = ptr as u32 as usize;
    let end = start + size as usize;
    if end > len {
        return Err(RuntimeError::InvalidAddress(ptr));
    }
    Ok(start..end)
}
