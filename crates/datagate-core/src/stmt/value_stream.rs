use super::Value;

use std::{
    collections::VecDeque,
    fmt,
    pin::Pin,
    task::{Context, Poll},
};
use tokio_stream::{Stream, StreamExt};

/// Rows returned by a backend. Each row is a [`Value::List`] with one entry
/// per selected column.
#[derive(Default)]
pub struct ValueStream {
    buffer: VecDeque<Value>,
    stream: Option<DynStream>,
}

type DynStream = Pin<Box<dyn Stream<Item = crate::Result<Value>> + Send + 'static>>;

impl ValueStream {
    pub fn from_stream<T>(stream: T) -> ValueStream
    where
        T: Stream<Item = crate::Result<Value>> + Send + 'static,
    {
        ValueStream {
            buffer: VecDeque::new(),
            stream: Some(Box::pin(stream)),
        }
    }

    pub fn from_vec(rows: Vec<Value>) -> ValueStream {
        ValueStream {
            buffer: rows.into(),
            stream: None,
        }
    }

    /// Returns the next row in the stream
    pub async fn next(&mut self) -> Option<crate::Result<Value>> {
        StreamExt::next(self).await
    }

    pub async fn collect(mut self) -> crate::Result<Vec<Value>> {
        let mut ret = Vec::with_capacity(self.buffer.len());

        while let Some(res) = self.next().await {
            ret.push(res?);
        }

        Ok(ret)
    }

    /// Buffers the remaining rows and returns a copy of them, leaving this
    /// stream readable.
    pub async fn dup(&mut self) -> crate::Result<ValueStream> {
        if let Some(mut stream) = self.stream.take() {
            while let Some(res) = stream.next().await {
                self.buffer.push_back(res?);
            }
        }

        Ok(ValueStream::from_vec(self.buffer.iter().cloned().collect()))
    }
}

impl Stream for ValueStream {
    type Item = crate::Result<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(next) = self.buffer.pop_front() {
            Poll::Ready(Some(Ok(next)))
        } else if let Some(stream) = self.stream.as_mut() {
            Pin::new(stream).poll_next(cx)
        } else {
            Poll::Ready(None)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (low, high) = match &self.stream {
            Some(stream) => stream.size_hint(),
            None => (0, Some(0)),
        };
        let buffered = self.buffer.len();
        (low + buffered, high.map(|high| high + buffered))
    }
}

impl From<Vec<Value>> for ValueStream {
    fn from(value: Vec<Value>) -> Self {
        ValueStream::from_vec(value)
    }
}

impl fmt::Debug for ValueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueStream")
            .field("buffered", &self.buffer.len())
            .field("streaming", &self.stream.is_some())
            .finish()
    }
}
