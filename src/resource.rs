//! Tri-state progress of a repository operation.

use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt};

use crate::error::RepoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource<T> {
    Loading,
    Success(T),
    Error(RepoError),
}

impl<T> From<Result<T, RepoError>> for Resource<T> {
    fn from(result: Result<T, RepoError>) -> Self {
        match result {
            Ok(data) => Resource::Success(data),
            Err(err) => Resource::Error(err),
        }
    }
}

/// Stream that yields `Loading`, then the outcome of `operation`, then ends.
///
/// Nothing runs until the stream is polled past the first item.
pub fn track<T, F>(operation: F) -> BoxStream<'static, Resource<T>>
where
    T: Send + 'static,
    F: Future<Output = Result<T, RepoError>> + Send + 'static,
{
    stream::once(async { Resource::Loading })
        .chain(stream::once(operation).map(Resource::from))
        .boxed()
}

/// Drain a tracked stream and return its terminal outcome.
#[cfg(test)]
pub async fn outcome<T>(mut stream: BoxStream<'static, Resource<T>>) -> Result<T, RepoError> {
    let mut outcome = None;
    while let Some(item) = stream.next().await {
        match item {
            Resource::Loading => {}
            Resource::Success(data) => outcome = Some(Ok(data)),
            Resource::Error(err) => outcome = Some(Err(err)),
        }
    }
    outcome.unwrap_or_else(|| Err(RepoError::Decode("operation produced no result".into())))
}
