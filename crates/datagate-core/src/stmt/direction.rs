#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nulls {
    First,
    Last,
}

impl Direction {
    /// Ascending keys place nulls last, descending keys place them first.
    pub fn nulls(self) -> Nulls {
        match self {
            Direction::Asc => Nulls::Last,
            Direction::Desc => Nulls::First,
        }
    }

    pub fn is_asc(self) -> bool {
        matches!(self, Direction::Asc)
    }
}
