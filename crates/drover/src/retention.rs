//! In-place conversation trimming: screenshot pruning to stay under the
//! provider image cap, and prompt-cache breakpoint placement. These two
//! functions are the only code that mutates history after it is appended.

use tracing::debug;

use crate::models::content::CacheControl;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;

/// Hard ceiling on kept images regardless of caller request. The provider
/// caps requests at 100 images; the margin leaves room for the current
/// turn's new screenshots.
pub const IMAGE_KEEP_CEILING: usize = 90;

/// Default granularity for image removal. Removing in chunks keeps the
/// prompt prefix stable across several turns, so an incremental prompt cache
/// is not invalidated by every new screenshot.
pub const DEFAULT_IMAGE_REMOVAL_CHUNK: usize = 10;

/// How many user messages may carry a cache breakpoint at once.
pub const MAX_CACHE_BREAKPOINTS: usize = 3;

fn count_tool_result_images(messages: &[Message]) -> usize {
    messages
        .iter()
        .flat_map(|message| &message.content)
        .filter_map(|block| block.as_tool_result())
        .map(|result| result.content.iter().filter(|c| c.is_image()).count())
        .sum()
}

/// Drop screenshots embedded in tool results, oldest first, until at most
/// `images_to_keep` remain. The removal count is rounded up to the next
/// multiple of `chunk`, so the kept count may undershoot `images_to_keep` by
/// up to `chunk - 1`. Text sub-blocks are always preserved.
pub fn prune_images(messages: &mut [Message], images_to_keep: usize, chunk: usize) {
    let images_to_keep = images_to_keep.min(IMAGE_KEEP_CEILING);
    let chunk = chunk.max(1);

    let total = count_tool_result_images(messages);
    let excess = total.saturating_sub(images_to_keep);
    if excess == 0 {
        return;
    }

    let mut budget = excess.div_ceil(chunk) * chunk;
    debug!(total, images_to_keep, removing = budget, "pruning old screenshots");

    for message in messages.iter_mut() {
        for block in message.content.iter_mut() {
            if let Some(result) = block.as_tool_result_mut() {
                result.content.retain(|item| {
                    if budget > 0 && item.is_image() {
                        budget -= 1;
                        false
                    } else {
                        true
                    }
                });
            }
        }
        if budget == 0 {
            break;
        }
    }
}

/// Mark the last content item of the `MAX_CACHE_BREAKPOINTS` most recent
/// non-empty user messages with an ephemeral cache marker, and clear markers
/// from every older user message. This bounds the number of cache segments a
/// caching-capable provider has to track.
pub fn mark_cache_breakpoints(messages: &mut [Message]) {
    let mut remaining = MAX_CACHE_BREAKPOINTS;

    for message in messages.iter_mut().rev() {
        if message.role != Role::User || message.content.is_empty() {
            continue;
        }
        if remaining > 0 {
            remaining -= 1;
            if let Some(last) = message.content.last_mut() {
                last.set_cache_control(Some(CacheControl::Ephemeral));
            }
        } else {
            for block in message.content.iter_mut() {
                block.set_cache_control(None);
            }
        }
    }
}
