use strum::{EnumIter, EnumString, IntoStaticStr};

/// Primitive operations. A primitive is applied to operand variables and
/// passes its single result to a continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Primitive {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Negate,
    Equals,
    LessThan,
    Not,
    /// Reads field `n` of a block: `(block, n)`
    Field,
    /// Returns the tag of a block
    Tag,
    Print,
}

impl Primitive {
    /// Number of operands the primitive expects
    pub fn arity(self) -> usize {
        match self {
            Primitive::Negate | Primitive::Not | Primitive::Tag | Primitive::Print => 1,
            Primitive::Add
            | Primitive::Subtract
            | Primitive::Multiply
            | Primitive::Divide
            | Primitive::Modulus
            | Primitive::Equals
            | Primitive::LessThan
            | Primitive::Field => 2,
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl core::fmt::Display for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn names_parse_back() {
        for primitive in Primitive::iter() {
            assert_eq!(Primitive::from_str(primitive.name()), Ok(primitive));
        }

        assert_eq!(Primitive::from_str("less_than"), Ok(Primitive::LessThan));
    }

    #[test]
    fn arities() {
        assert_eq!(Primitive::Add.arity(), 2);
        assert_eq!(Primitive::Not.arity(), 1);
    }
}
