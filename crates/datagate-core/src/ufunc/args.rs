use indexmap::IndexMap;

/// Evaluated call arguments.
#[derive(Debug, Clone, Default)]
pub struct Args<T> {
    pub args: Vec<T>,
    pub kwargs: IndexMap<String, T>,
}

impl<T> Args<T> {
    pub fn new(args: Vec<T>) -> Args<T> {
        Args {
            args,
            kwargs: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    /// Moves the positional arguments out as a fixed-size array.
    ///
    /// Handlers are dispatched on the argument count, so the count matches
    /// the handler's signature.
    pub fn take<const N: usize>(self) -> Option<[T; N]> {
        self.args.try_into().ok()
    }
}

impl<T> From<Vec<T>> for Args<T> {
    fn from(value: Vec<T>) -> Self {
        Args::new(value)
    }
}
