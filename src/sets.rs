use crate::error::StartggError;
use crate::startgg::StartggClient;
use crate::types::*;
use std::thread::sleep;
use tracing::{debug, info, warn};

/// Collects every set of `event` page by page in one mode.
///
/// Stops at `pageInfo.totalPages` when the server reports it, otherwise on the first
/// short page. `max_pages` truncates the walk without raising an error, and `Some(0)`
/// means no cap, same as `None`. Any error, complexity rejections included, aborts the
/// walk and is returned as-is.
pub fn fetch_all_sets_for_event(
  client: &StartggClient,
  event: EventHandle,
  mode: FetchMode,
  requested_per_page: u32,
  max_pages: Option<u32>,
) -> Result<Vec<StartggSetNode>, StartggError> {
  let per_page = mode.effective_per_page(requested_per_page);
  let max_pages = max_pages.filter(|pages| *pages > 0);
  let mut out = Vec::new();
  let mut page: u32 = 1;
  let mut fetched: u32 = 0;
  loop {
    let container = client.fetch_event_sets_page(event, mode, page, per_page)?;
    fetched += 1;
    let nodes = container.nodes.unwrap_or_default();
    let returned = nodes.len();
    out.extend(nodes);

    let total_pages = container.page_info.and_then(|info| info.total_pages);
    let last_page = match total_pages {
      Some(total) => i64::from(page) >= total,
      None => returned < per_page as usize,
    };
    if last_page {
      break;
    }
    page += 1;

    if let Some(max_pages) = max_pages {
      if page > max_pages {
        info!(event = %event, %mode, max_pages, "page cap reached, truncating sets");
        break;
      }
    }

    let delay = client.page_delay();
    if !delay.is_zero() {
      sleep(delay);
    }
  }
  debug!(event = %event, %mode, pages = fetched, sets = out.len(), "fetched sets");
  Ok(out)
}

/// Fetches all sets, downgrading from the full to the light query once on a complexity rejection.
///
/// The light attempt starts over at page 1 and nothing from the full attempt is kept.
/// A second complexity rejection ends in [`StartggError::ExhaustedFallback`]. Every other
/// error is returned unchanged on the first occurrence.
pub fn fetch_sets_with_fallback(
  client: &StartggClient,
  event: EventHandle,
  options: &FetchOptions,
) -> Result<FetchOutcome, StartggError> {
  let initial = FetchMode::initial(options.force_light);
  let mut mode = initial;
  loop {
    match fetch_all_sets_for_event(client, event, mode, options.per_page, options.max_pages) {
      Ok(sets) => {
        return Ok(FetchOutcome {
          sets,
          mode,
          downgraded: mode != initial,
        })
      }
      Err(StartggError::ComplexityRejected(message)) => match mode.downgrade() {
        Some(next) => {
          warn!(
            event = %event,
            from = %mode,
            to = %next,
            %message,
            "start.gg query complexity too high, retrying with a lighter query and smaller page size"
          );
          mode = next;
        }
        None => return Err(StartggError::ExhaustedFallback(message)),
      },
      Err(err) => return Err(err),
    }
  }
}
