use super::{ColumnRef, Direction, Nulls};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub direction: Direction,
    pub nulls: Nulls,
}

impl OrderBy {
    /// Orders by the column with the null placement implied by `direction`.
    pub fn new(column: ColumnRef, direction: Direction) -> OrderBy {
        OrderBy {
            column,
            direction,
            nulls: direction.nulls(),
        }
    }
}
