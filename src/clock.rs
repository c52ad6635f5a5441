use chrono::{FixedOffset, NaiveDate, Utc};

/// Calendar clock pinned to a fixed UTC offset. Every day-boundary decision
/// in the ledger (completion gate, streak gap, wager lock) uses the same
/// notion of "today" from here.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    offset: FixedOffset,
}

impl Clock {
    pub fn fixed(offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Self { offset }
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

pub fn now_ts() -> u64 {
    Utc::now().timestamp() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extreme_offset_falls_back_to_utc() {
        // FixedOffset rejects offsets beyond +/-24h; we degrade to UTC.
        let c = Clock::fixed(99);
        let utc = Clock::fixed(0);
        let d = c.today();
        assert!(d == utc.today() || d.succ_opt() == Some(utc.today()) || utc.today().succ_opt() == Some(d));
    }
}
