//! Telegram message size limit.

use std::borrow::Cow;

/// Longest text Telegram accepts in one message, in bytes.
pub const MAX_MESSAGE_LEN: usize = 4095;

/// Appended to a truncated message. `CUT_BEFORE + SNIP_MARKER.len()` stays
/// within [`MAX_MESSAGE_LEN`].
pub const SNIP_MARKER: &str = "\n<b>[SNIP]</b>";

/// Truncated text must end at a paragraph break before this byte offset.
pub const CUT_BEFORE: usize = 4080;

/// Sent instead of an oversized message with no paragraph break to cut at.
pub const TOO_LONG_PLACEHOLDER: &str = "Message is too long... can't send..";

/// Fit `text` into a single Telegram message.
///
/// Text within the limit is returned untouched. Longer text is cut at the
/// last blank line (`"\n\n"`) before byte [`CUT_BEFORE`], so that HTML tags
/// of the last complete alert stay balanced, and [`SNIP_MARKER`] is appended.
/// Without such a boundary the whole text is replaced by
/// [`TOO_LONG_PLACEHOLDER`].
pub fn truncate_message(text: &str) -> Cow<'_, str> {
  if text.len() <= MAX_MESSAGE_LEN {
    return Cow::Borrowed(text);
  }

  let head = &text.as_bytes()[..CUT_BEFORE];
  let boundary = head.windows(2).rposition(|w| w == b"\n\n");

  match boundary {
    // '\n' is ASCII, so `i` always lands on a char boundary.
    Some(i) if i > 1 => Cow::Owned(format!("{}{SNIP_MARKER}", &text[..i])),
    _ => Cow::Borrowed(TOO_LONG_PLACEHOLDER),
  }
}
