use serde::{Deserialize, Serialize};

/// A value that may be written either as a single item or as a JSON array.
///
/// The shape read from the wire is kept so that re-encoding a document
/// reproduces it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn any<F>(&self, f: F) -> bool
    where
        F: Fn(&T) -> bool,
    {
        match self {
            Self::One(value) => f(value),
            Self::Many(values) => values.iter().any(f),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(_) => false,
            Self::Many(values) => values.is_empty(),
        }
    }

    pub fn contains(&self, x: &T) -> bool
    where
        T: PartialEq<T>,
    {
        self.any(|value| value == x)
    }

    pub fn first(&self) -> Option<&T> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) => values.first(),
        }
    }

    /// Returns the only element, if there is exactly one.
    pub fn to_single(&self) -> Option<&T> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) if values.len() == 1 => values.first(),
            Self::Many(_) => None,
        }
    }

    pub fn to_single_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) if values.len() == 1 => values.first_mut(),
            Self::Many(_) => None,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Self::One(value) => std::slice::from_ref(value).iter(),
            Self::Many(values) => values.iter(),
        }
    }

    /// Appends a value. A single value becomes a two-element list.
    pub fn push(&mut self, value: T) {
        let values = match std::mem::replace(self, Self::Many(Vec::new())) {
            Self::One(first) => vec![first, value],
            Self::Many(mut values) => {
                values.push(value);
                values
            }
        };
        *self = Self::Many(values);
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}

impl<T> IntoIterator for OneOrMany<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

impl<'a, T> IntoIterator for &'a OneOrMany<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_order() {
        let mut values = OneOrMany::One(1);
        values.push(2);
        values.push(3);
        assert_eq!(values, OneOrMany::Many(vec![1, 2, 3]));
        assert_eq!(values.first(), Some(&1));
        assert!(values.to_single().is_none());
    }

    #[test]
    fn shape_survives_serialization() {
        let one: OneOrMany<String> = serde_json::from_str(r#""a""#).unwrap();
        assert_eq!(serde_json::to_string(&one).unwrap(), r#""a""#);
        let many: OneOrMany<String> = serde_json::from_str(r#"["a"]"#).unwrap();
        assert_eq!(serde_json::to_string(&many).unwrap(), r#"["a"]"#);
        assert_eq!(many.to_single(), Some(&"a".to_string()));
    }
}
