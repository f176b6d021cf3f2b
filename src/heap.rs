//! Array objects and the heap that owns them.
//!
//! The heap is an append-only arena. A handle is the object's position in
//! the arena plus one, so handle `0` is free to act as the null reference and
//! every issued handle stays valid for the life of the heap. Each object owns
//! its storage, which never moves when the arena grows.
use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::descriptor::BaseTypeKind;
use crate::error::Fault;

type Result<T> = std::result::Result<T, Fault>;

/// Opaque handle to a heap object, stored as-is in stack and static slots.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(u32);

impl ObjectRef {
    pub const NULL: ObjectRef = ObjectRef(0);

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Reinterpret a slot value as a handle.
    pub const fn from_slot(slot: i32) -> Self {
        Self(slot as u32)
    }

    pub const fn to_slot(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "@{}", self.0)
        }
    }
}

/// Element type for the `atype` operand of `newarray`.
pub fn array_type_from_code(code: u8) -> Option<BaseTypeKind> {
    let t = match code {
        4 => BaseTypeKind::Boolean,
        5 => BaseTypeKind::Char,
        6 => BaseTypeKind::Float,
        7 => BaseTypeKind::Double,
        8 => BaseTypeKind::Byte,
        9 => BaseTypeKind::Short,
        10 => BaseTypeKind::Int,
        11 => BaseTypeKind::Long,
        _ => return None,
    };
    Some(t)
}

/// A one-dimensional array of primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayObject {
    element: BaseTypeKind,
    length: usize,
    data: Vec<u8>,
}

impl ArrayObject {
    fn new(element: BaseTypeKind, length: usize) -> Self {
        Self {
            element,
            length,
            data: vec![0; element.width() * length],
        }
    }

    pub const fn element_type(&self) -> BaseTypeKind {
        self.element
    }

    pub const fn len(&self) -> usize {
        self.length
    }

    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Raw element storage, `len() * width` bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn int_offset(&self, index: i32) -> Result<usize> {
        if self.element != BaseTypeKind::Int {
            return Err(Fault::unsupported(format!(
                "int access to a {:?} array",
                self.element
            )));
        }
        match usize::try_from(index) {
            Ok(i) if i < self.length => Ok(i * BaseTypeKind::Int.width()),
            _ => Err(Fault::index_out_of_range(index, self.length)),
        }
    }

    pub fn load_int(&self, index: i32) -> Result<i32> {
        let offset = self.int_offset(index)?;
        Ok(LittleEndian::read_i32(&self.data[offset..offset + 4]))
    }

    pub fn store_int(&mut self, index: i32, value: i32) -> Result<()> {
        let offset = self.int_offset(index)?;
        LittleEndian::write_i32(&mut self.data[offset..offset + 4], value);
        Ok(())
    }

    /// Integer elements in order.
    pub fn ints(&self) -> Result<Vec<i32>> {
        (0..self.length as i32).map(|i| self.load_int(i)).collect()
    }
}

#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<ArrayObject>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed array of `count` elements.
    pub fn allocate(&mut self, element: BaseTypeKind, count: i32) -> Result<ObjectRef> {
        if matches!(element, BaseTypeKind::Void | BaseTypeKind::Class) {
            return Err(Fault::unsupported(format!(
                "cannot allocate a primitive array of {element:?}"
            )));
        }
        let length = usize::try_from(count).map_err(|_| Fault::negative_array_size(count))?;
        self.objects.push(ArrayObject::new(element, length));
        Ok(ObjectRef(self.objects.len() as u32))
    }

    pub fn get(&self, handle: ObjectRef) -> Result<&ArrayObject> {
        if handle.is_null() {
            return Err(Fault::null_reference());
        }
        self.objects
            .get(handle.0 as usize - 1)
            .ok_or_else(|| Fault::malformed(format!("dangling object reference {handle}")))
    }

    pub fn get_mut(&mut self, handle: ObjectRef) -> Result<&mut ArrayObject> {
        if handle.is_null() {
            return Err(Fault::null_reference());
        }
        self.objects
            .get_mut(handle.0 as usize - 1)
            .ok_or_else(|| Fault::malformed(format!("dangling object reference {handle}")))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;

    #[test]
    fn int_array_round_trip() {
        let mut heap = Heap::new();
        let handle = heap.allocate(BaseTypeKind::Int, 4).unwrap();
        assert!(!handle.is_null());

        heap.get_mut(handle).unwrap().store_int(1, 42).unwrap();
        let array = heap.get(handle).unwrap();
        assert_eq!(array.load_int(1).unwrap(), 42);
        assert_eq!(array.ints().unwrap(), vec![0, 42, 0, 0]);
    }

    #[test]
    fn out_of_range_access_leaves_storage_untouched() {
        let mut heap = Heap::new();
        let handle = heap.allocate(BaseTypeKind::Int, 4).unwrap();
        let array = heap.get_mut(handle).unwrap();
        for index in [-1, 4, i32::MIN, i32::MAX] {
            assert_eq!(
                array.store_int(index, 7).unwrap_err().kind,
                FaultKind::IndexOutOfRange
            );
            assert_eq!(
                array.load_int(index).unwrap_err().kind,
                FaultKind::IndexOutOfRange
            );
        }
        assert!(array.bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn handles_survive_growth() {
        let mut heap = Heap::new();
        let first = heap.allocate(BaseTypeKind::Int, 2).unwrap();
        heap.get_mut(first).unwrap().store_int(0, -5).unwrap();
        for _ in 0..1000 {
            heap.allocate(BaseTypeKind::Int, 16).unwrap();
        }
        assert_eq!(heap.get(first).unwrap().load_int(0).unwrap(), -5);
        assert_eq!(heap.len(), 1001);
    }

    #[test]
    fn element_widths() {
        let mut heap = Heap::new();
        for (t, width) in [
            (BaseTypeKind::Boolean, 1),
            (BaseTypeKind::Char, 2),
            (BaseTypeKind::Long, 8),
        ] {
            let handle = heap.allocate(t, 3).unwrap();
            let array = heap.get(handle).unwrap();
            assert_eq!(array.bytes().len(), 3 * width);
            assert_eq!(
                array.load_int(0).unwrap_err().kind,
                FaultKind::UnsupportedOperation
            );
        }
    }

    #[test]
    fn rejects_negative_sizes_and_null() {
        let mut heap = Heap::new();
        let err = heap.allocate(BaseTypeKind::Int, -1).unwrap_err();
        assert_eq!(err.exception, Some("java/lang/NegativeArraySizeException"));
        assert_eq!(
            heap.get(ObjectRef::NULL).unwrap_err().kind,
            FaultKind::NullReference
        );
        assert_eq!(array_type_from_code(10), Some(BaseTypeKind::Int));
        assert_eq!(array_type_from_code(3), None);
    }
}
