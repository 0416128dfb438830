use std::fmt;

/// Index of an object inside the owning isolate's heap.
///
/// References never cross isolates: an `ObjectRef` is only meaningful to the
/// heap it was allocated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(pub u32);

impl ObjectRef {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A slot value as seen by the root walk.
///
/// Immediates (`Null`, `Bool`, `Smi`) carry no heap edge; only `Ref` slots are
/// of interest to a collector, but visitors are handed every slot so they can
/// relocate references in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Smi(i64),
    Ref(ObjectRef),
}

impl Value {
    #[inline]
    pub fn is_null(self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn is_ref(self) -> bool {
        matches!(self, Value::Ref(_))
    }

    #[inline]
    pub fn as_object(self) -> Option<ObjectRef> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_smi(self) -> Option<i64> {
        match self {
            Value::Smi(i) => Some(i),
            _ => None,
        }
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Value::Ref(r)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Smi(i)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Smi(i) => write!(f, "{i}"),
            Value::Ref(r) => write!(f, "@{}", r.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_only_match_their_variant() {
        let r = Value::Ref(ObjectRef(7));
        assert_eq!(r.as_object(), Some(ObjectRef(7)));
        assert_eq!(r.as_smi(), None);
        assert_eq!(Value::Smi(3).as_smi(), Some(3));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert!(Value::default().is_null());
    }

    #[test]
    fn display_marks_references() {
        assert_eq!(Value::Ref(ObjectRef(12)).to_string(), "@12");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
