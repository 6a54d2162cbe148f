use log::info;

use crate::error::{MailError, Result};
use crate::mail::criteria::FetchPlan;
use crate::mail::session::{MailSession, RawMessage};

/// Full message, fetched with PEEK so `\Seen` is never set.
pub const FETCH_ITEMS: &str = "(UID BODY.PEEK[])";

/// Run `plan` over `session` and return the raw messages newest-first.
///
/// Either every matching message comes back or the call fails.
pub fn fetch_raw<S: MailSession>(session: &mut S, plan: &FetchPlan) -> Result<Vec<RawMessage>> {
    let mut messages = match plan {
        FetchPlan::Empty => return Ok(vec![]),
        FetchPlan::Window { start } => {
            let seq = format!("{start}:*");
            info!("Fetching recent window {seq}");
            let mut got = session.fetch(&seq, FETCH_ITEMS)?;
            got.sort_unstable_by_key(|m| m.seq);
            got
        }
        FetchPlan::Search(terms) => {
            let query = FetchPlan::search_query(terms);
            info!("Searching {query}");
            let mut uids = session.uid_search(&query)?;
            if uids.is_empty() {
                return Ok(vec![]);
            }
            uids.sort_unstable();
            uids.dedup();

            let uid_set = uids
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let mut got = session.uid_fetch(&uid_set, FETCH_ITEMS)?;
            if got.len() != uids.len() {
                return Err(MailError::Retrieval(format!(
                    "search matched {} messages but {} were fetched",
                    uids.len(),
                    got.len()
                )));
            }
            got.sort_unstable_by_key(|m| m.uid);
            got
        }
    };

    messages.reverse();
    info!("Fetched {} messages", messages.len());
    Ok(messages)
}
