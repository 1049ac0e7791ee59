//! Stream helpers shared by store selections and their consumers.

use std::future;

use futures::stream::{BoxStream, Stream, StreamExt};

/// A live projection of store state.
pub type Selection<T> = BoxStream<'static, T>;

/// Drops items structurally equal to the previously yielded item.
pub fn distinct_until_changed<S>(stream: S) -> impl Stream<Item = S::Item>
where
	S: Stream,
	S::Item: Clone + PartialEq,
{
	let mut last = None;
	stream.filter_map(move |item| {
		let changed = last.as_ref() != Some(&item);
		if changed {
			last = Some(item.clone());
		}
		future::ready(changed.then_some(item))
	})
}

/// Drops `None` items and unwraps the rest.
pub fn filter_nil<S, T>(stream: S) -> impl Stream<Item = T>
where
	S: Stream<Item = Option<T>>,
{
	stream.filter_map(future::ready)
}
