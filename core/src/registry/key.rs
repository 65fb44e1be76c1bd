use std::any::{type_name, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// **TYPE KEY**
///
/// **PURPOSE**: Identity of a resolvable service.
/// **GUARANTEE**: Equality and hashing use the `TypeId` and the optional slot
/// name only; the type name is carried for diagnostics.
#[derive(Clone)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<Cow<'static, str>>,
}

impl Key {
    /// Key for the Rust type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: None,
        }
    }

    /// Named slot of type `T`, distinct from `Key::of::<T>()` and from other names.
    pub fn named<T: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::of::<T>()
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}[{}]", self.type_name, name),
            None => f.write_str(self.type_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_named_keys_do_not_collide() {
        let mut keys = HashSet::new();
        keys.insert(Key::of::<String>());
        keys.insert(Key::named::<String>("X"));
        keys.insert(Key::named::<String>("Y"));
        keys.insert(Key::named::<String>(String::from("X")));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_display_includes_name() {
        assert_eq!(Key::named::<u32>("port").to_string(), "u32[port]");
        assert_eq!(Key::of::<u32>().to_string(), "u32");
    }
}
