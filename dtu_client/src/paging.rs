//! Multi-page response assembly. Two operations — "real data new" and
//! "historical app power" — advertise continuation pages via `ap`/`cp`
//! fields; this module chains the follow-up round trips and merges each
//! page into an accumulator, reusing `dtu_client::engine`'s general
//! `None`-on-failure idiom.

use dtu_core::proto::{AppGetHistPowerReqDto, RealDataNewReqDto};

/// A decoded response message that may span several wire pages.
pub trait PagedResponse: Sized {
    fn total_pages(&self) -> i32;
    fn current_page(&self) -> i32;

    /// Merge a later page into `self`: concatenate repeated fields,
    /// last-write-wins for scalars.
    fn merge_page(&mut self, next: Self);
}

impl PagedResponse for RealDataNewReqDto {
    fn total_pages(&self) -> i32 {
        self.ap
    }

    fn current_page(&self) -> i32 {
        self.cp
    }

    fn merge_page(&mut self, next: Self) {
        self.ap = next.ap;
        self.cp = next.cp;
        self.sgs_data.extend(next.sgs_data);
    }
}

impl PagedResponse for AppGetHistPowerReqDto {
    fn total_pages(&self) -> i32 {
        self.ap
    }

    fn current_page(&self) -> i32 {
        self.cp
    }

    fn merge_page(&mut self, next: Self) {
        self.ap = next.ap;
        self.cp = next.cp;
        self.power_data.extend(next.power_data);
    }
}

/// Assembles a paginated response starting from the already-decoded
/// first reply. `fetch_page(cp)` performs one full round trip
/// (including the rate limit) for continuation page `cp` and returns
/// `None` on any transport/framing failure, in which case assembly
/// aborts and `None` is returned overall.
///
/// If the first reply's `ap` is less than 2, no follow-ups are issued —
/// this also covers firmware that reports `ap=0` on a single-page reply.
pub fn assemble<T, F>(first: T, mut fetch_page: F) -> Option<T>
where
    T: PagedResponse,
    F: FnMut(i32) -> Option<T>,
{
    let total_pages = first.total_pages();
    if total_pages < 2 {
        return Some(first);
    }

    let mut accumulator = first;
    for page in 1..total_pages {
        let next = fetch_page(page)?;
        accumulator.merge_page(next);
    }
    Some(accumulator)
}
