use super::TypeTag;

use std::fmt;

/// Positional parameter types of an overload, with an optional type for any
/// further arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<TypeTag>,
    pub rest: Option<TypeTag>,
}

impl Signature {
    pub fn new(params: &[TypeTag]) -> Signature {
        Signature {
            params: params.to_vec(),
            rest: None,
        }
    }

    pub fn variadic(params: &[TypeTag], rest: TypeTag) -> Signature {
        Signature {
            params: params.to_vec(),
            rest: Some(rest),
        }
    }

    /// The parameter type expected at `index`.
    fn param(&self, index: usize) -> Option<TypeTag> {
        self.params.get(index).copied().or(self.rest)
    }

    pub fn matches(&self, tags: &[TypeTag]) -> bool {
        if tags.len() < self.params.len() || (self.rest.is_none() && tags.len() != self.params.len())
        {
            return false;
        }
        tags.iter()
            .enumerate()
            .all(|(index, tag)| self.param(index).is_some_and(|param| tag.is_a(param)))
    }

    /// Sum of parameter depths. Deeper tags are more specific.
    pub fn specificity(&self) -> usize {
        self.params.iter().map(|tag| tag.depth()).sum::<usize>()
            + self.rest.map(TypeTag::depth).unwrap_or(0)
    }

    /// True when every argument list accepted by `self` is also accepted by
    /// `other`.
    pub fn dominates(&self, other: &Signature) -> bool {
        match (self.rest, other.rest) {
            (Some(_), None) => return false,
            (Some(rest), Some(other_rest)) if !rest.is_a(other_rest) => return false,
            (None, None) if self.params.len() != other.params.len() => return false,
            _ => {}
        }
        if self.params.len() < other.params.len() {
            return false;
        }
        (0..self.params.len())
            .all(|index| match other.param(index) {
                Some(param) => self.params[index].is_a(param),
                None => false,
            })
    }

    /// True when some argument list is accepted by both signatures.
    pub fn overlaps(&self, other: &Signature) -> bool {
        let len = self.params.len().max(other.params.len());
        if self.rest.is_none() && len > self.params.len() {
            return false;
        }
        if other.rest.is_none() && len > other.params.len() {
            return false;
        }
        (0..len).all(|index| match (self.param(index), other.param(index)) {
            (Some(lhs), Some(rhs)) => lhs.is_a(rhs) || rhs.is_a(lhs),
            _ => false,
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, tag) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{tag}")?;
        }
        if let Some(rest) = self.rest {
            if !self.params.is_empty() {
                f.write_str(", ")?;
            }
            write!(f, "*{rest}")?;
        }
        f.write_str(")")
    }
}
