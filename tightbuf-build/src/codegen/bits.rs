//! Presence bit allocation.
//!
//! Every singular field owns one bit in the message's `has_bits: [u32; N]`
//! array, and every oneof owns one bit shared by its members. Bits are handed
//! out in declaration order; a oneof takes its bit at the position of its
//! first member. Repeated fields use container emptiness instead.

use super::classify::{Cardinality, Strategy};

/// Location of one presence bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceBit {
    pub index: usize,
}

impl PresenceBit {
    /// Index into `has_bits`.
    pub fn word(self) -> usize {
        self.index / 32
    }

    /// Mask within the word.
    pub fn mask(self) -> u32 {
        1 << (self.index % 32)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitAllocation {
    /// Per field, in declaration order.
    pub fields: Vec<Option<PresenceBit>>,
    /// Per entry of `oneof_decl`; `None` for oneofs without members.
    pub oneofs: Vec<Option<PresenceBit>>,
    pub word_count: usize,
}

/// Allocate presence bits for a message's fields, given their strategies in
/// declaration order and the number of declared oneofs.
pub fn allocate(strategies: &[Strategy], oneof_count: usize) -> BitAllocation {
    let mut next = 0;
    let mut take = || {
        let bit = PresenceBit { index: next };
        next += 1;
        bit
    };

    let mut oneofs = vec![None; oneof_count];
    let fields = strategies
        .iter()
        .map(|strategy| match strategy.cardinality {
            Cardinality::Singular => Some(take()),
            Cardinality::Repeated { .. } => None,
            Cardinality::Oneof { index } => {
                let slot = oneofs.get_mut(index)?;
                Some(*slot.get_or_insert_with(&mut take))
            }
        })
        .collect();

    BitAllocation {
        fields,
        oneofs,
        word_count: next.div_ceil(32),
    }
}

#[cfg(test)]
mod tests {
    use proptest::{prop_assert_eq, property_test};

    use super::{allocate, PresenceBit};
    use crate::codegen::classify::{Cardinality, Category, Strategy};
    use crate::codegen::types::ScalarType;

    fn strategy(cardinality: Cardinality) -> Strategy {
        Strategy {
            cardinality,
            category: Category::Scalar(ScalarType::Int32),
        }
    }

    #[test]
    fn test_declaration_order() {
        let strategies = [
            strategy(Cardinality::Singular),
            strategy(Cardinality::Repeated { packed: true }),
            strategy(Cardinality::Oneof { index: 0 }),
            strategy(Cardinality::Singular),
            strategy(Cardinality::Oneof { index: 0 }),
        ];
        let bits = allocate(&strategies, 1);

        let indices: Vec<_> = bits.fields.iter().map(|b| b.map(|b| b.index)).collect();
        assert_eq!(indices, [Some(0), None, Some(1), Some(2), Some(1)]);
        assert_eq!(bits.oneofs, [Some(PresenceBit { index: 1 })]);
        assert_eq!(bits.word_count, 1);
    }

    #[test]
    fn test_no_bits_no_words() {
        let bits = allocate(&[strategy(Cardinality::Repeated { packed: false })], 0);
        assert_eq!(bits.word_count, 0);
    }

    #[test]
    fn test_word_boundary() {
        let strategies = vec![strategy(Cardinality::Singular); 33];
        let bits = allocate(&strategies, 0);
        assert_eq!(bits.word_count, 2);

        let last = bits.fields[32].unwrap();
        assert_eq!(last.word(), 1);
        assert_eq!(last.mask(), 1);

        let before = bits.fields[31].unwrap();
        assert_eq!(before.word(), 0);
        assert_eq!(before.mask(), 0x8000_0000);
    }

    #[property_test]
    fn proptest_bits_are_dense(singular: u8) {
        let singular = usize::from(singular);
        let strategies = vec![strategy(Cardinality::Singular); singular];
        let bits = allocate(&strategies, 0);

        let mut seen: Vec<_> = bits.fields.iter().map(|b| b.unwrap().index).collect();
        seen.dedup();
        prop_assert_eq!(seen, (0..singular).collect::<Vec<_>>());
        prop_assert_eq!(bits.word_count, singular.div_ceil(32));
    }
}
