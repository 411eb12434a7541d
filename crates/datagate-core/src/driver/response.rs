use crate::{stmt::ValueStream, Result};

#[derive(Debug)]
pub struct Response {
    pub rows: Rows,
}

#[derive(Debug)]
pub enum Rows {
    /// Number of rows impacted by the operation
    Count(u64),

    /// Operation result, as a stream of rows
    Values(ValueStream),
}

impl Response {
    pub fn count(count: u64) -> Self {
        Self {
            rows: Rows::Count(count),
        }
    }

    pub fn value_stream(values: impl Into<ValueStream>) -> Self {
        Self {
            rows: Rows::Values(values.into()),
        }
    }

    pub fn empty_value_stream() -> Self {
        Self {
            rows: Rows::Values(ValueStream::default()),
        }
    }
}

impl Rows {
    pub fn is_count(&self) -> bool {
        matches!(self, Self::Count(_))
    }

    pub async fn dup(&mut self) -> Result<Self> {
        match self {
            Rows::Count(count) => Ok(Rows::Count(*count)),
            Rows::Values(values) => Ok(Rows::Values(values.dup().await?)),
        }
    }

    /// The affected row count. A value stream counts its rows.
    pub async fn into_count(self) -> Result<u64> {
        match self {
            Rows::Count(count) => Ok(count),
            Rows::Values(values) => Ok(values.collect().await?.len() as u64),
        }
    }

    /// The returned rows. A count yields no rows.
    pub fn into_values(self) -> ValueStream {
        match self {
            Rows::Values(values) => values,
            Rows::Count(_) => ValueStream::default(),
        }
    }
}
