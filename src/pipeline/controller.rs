//! Pagination / scroll state machine.
//!
//! Sources do not say how many pages they have, so the crawl stops on
//! whichever comes first: the iteration budget, running out of content
//! (consecutive iterations without cards) or running out of novelty
//! (consecutive iterations whose cards are all already known).

use crate::models::CrawlMode;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    BudgetExhausted,
    ContentExhausted,
    NoveltyExhausted,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BudgetExhausted => "budget exhausted",
            Self::ContentExhausted => "no more content",
            Self::NoveltyExhausted => "no new records",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    AdvancingPage { offset: u32 },
    Scrolling { offset: u32 },
    ExtractingCards,
    VisitingDetail,
    Deciding,
    Terminated(TerminationReason),
}

#[derive(Debug)]
pub struct Controller {
    mode: CrawlMode,
    start: u32,
    /// 0 = unlimited
    budget: u32,
    zero_cards_threshold: u32,
    zero_new_threshold: u32,
    iterations: u32,
    zero_cards: u32,
    zero_new: u32,
    state: CrawlState,
}

impl Controller {
    pub fn new(
        mode: CrawlMode,
        start: u32,
        budget: u32,
        zero_cards_threshold: u32,
        zero_new_threshold: u32,
    ) -> Self {
        Self {
            mode,
            start,
            budget,
            zero_cards_threshold: zero_cards_threshold.max(1),
            zero_new_threshold: zero_new_threshold.max(1),
            iterations: 0,
            zero_cards: 0,
            zero_new: 0,
            state: Self::moving(mode, start),
        }
    }

    fn moving(mode: CrawlMode, offset: u32) -> CrawlState {
        match mode {
            CrawlMode::Paginated => CrawlState::AdvancingPage { offset },
            CrawlMode::InfiniteScroll => CrawlState::Scrolling { offset },
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        match self.state {
            CrawlState::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Start the next iteration and return its offset, or `None` once terminated.
    pub fn advance(&mut self) -> Option<u32> {
        if self.termination().is_some() {
            return None;
        }
        if self.budget > 0 && self.iterations >= self.budget {
            info!("Reached iteration budget ({})", self.budget);
            self.state = CrawlState::Terminated(TerminationReason::BudgetExhausted);
            return None;
        }

        let offset = self.start.saturating_add(self.iterations);
        self.iterations = self.iterations.saturating_add(1);
        self.state = Self::moving(self.mode, offset);
        Some(offset)
    }

    pub fn listing_loaded(&mut self) {
        self.state = CrawlState::ExtractingCards;
    }

    pub fn cards_extracted(&mut self, cards: usize) {
        debug!("{} cards extracted", cards);
        self.state = CrawlState::VisitingDetail;
    }

    /// Close an iteration. A failed listing load is reported as zero cards.
    pub fn finish_iteration(&mut self, cards: usize, accepted: usize) -> CrawlState {
        self.state = CrawlState::Deciding;

        if cards == 0 {
            self.zero_cards += 1;
        } else {
            self.zero_cards = 0;
            if accepted == 0 {
                self.zero_new += 1;
            } else {
                self.zero_new = 0;
            }
        }

        self.state = if self.zero_cards >= self.zero_cards_threshold {
            info!("{} consecutive iterations without cards, stopping", self.zero_cards);
            CrawlState::Terminated(TerminationReason::ContentExhausted)
        } else if self.zero_new >= self.zero_new_threshold {
            info!("{} consecutive iterations without new records, stopping", self.zero_new);
            CrawlState::Terminated(TerminationReason::NoveltyExhausted)
        } else {
            Self::moving(self.mode, self.start.saturating_add(self.iterations))
        };
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(c: &mut Controller, per_iteration: impl Fn(u32) -> (usize, usize)) -> Vec<u32> {
        let mut offsets = Vec::new();
        while let Some(offset) = c.advance() {
            offsets.push(offset);
            let (cards, accepted) = per_iteration(offset);
            c.finish_iteration(cards, accepted);
            assert!(offsets.len() < 1000, "controller never terminated");
        }
        offsets
    }

    #[test]
    fn test_zero_cards_terminates_after_threshold() {
        let mut c = Controller::new(CrawlMode::Paginated, 1, 0, 2, 3);
        let offsets = drive(&mut c, |_| (0, 0));
        assert_eq!(offsets, vec![1, 2]);
        assert_eq!(c.termination(), Some(TerminationReason::ContentExhausted));
    }

    #[test]
    fn test_zero_new_terminates_after_threshold() {
        let mut c = Controller::new(CrawlMode::InfiniteScroll, 1, 0, 2, 3);
        let offsets = drive(&mut c, |_| (5, 0));
        assert_eq!(offsets.len(), 3);
        assert_eq!(c.termination(), Some(TerminationReason::NoveltyExhausted));
    }

    #[test]
    fn test_budget_counts_from_start_offset() {
        let mut c = Controller::new(CrawlMode::Paginated, 4, 3, 2, 3);
        let offsets = drive(&mut c, |_| (5, 5));
        assert_eq!(offsets, vec![4, 5, 6]);
        assert_eq!(c.iterations(), 3);
        assert_eq!(c.termination(), Some(TerminationReason::BudgetExhausted));
    }

    #[test]
    fn test_start_near_max_offset_does_not_overflow() {
        let mut c = Controller::new(CrawlMode::Paginated, u32::MAX - 1, 3, 2, 3);
        let offsets = drive(&mut c, |_| (5, 5));
        assert_eq!(offsets, vec![u32::MAX - 1, u32::MAX, u32::MAX]);
        assert_eq!(c.termination(), Some(TerminationReason::BudgetExhausted));
    }

    #[test]
    fn test_counters_reset_independently() {
        let mut c = Controller::new(CrawlMode::Paginated, 1, 0, 2, 3);
        // empty, cards-no-new, empty, cards-no-new, cards-no-new, cards-no-new
        let script = [(0, 0), (5, 0), (0, 0), (5, 0), (5, 0), (5, 0)];
        let offsets = drive(&mut c, |o| script[(o - 1) as usize]);
        // an empty iteration neither bumps nor resets the novelty counter
        assert_eq!(offsets.len(), 5);
        assert_eq!(c.termination(), Some(TerminationReason::NoveltyExhausted));
    }

    #[test]
    fn test_acceptance_resets_novelty_counter() {
        let mut c = Controller::new(CrawlMode::Paginated, 1, 0, 2, 3);
        let script = [(5, 0), (5, 0), (5, 1), (5, 0), (5, 0), (5, 0)];
        let offsets = drive(&mut c, |o| script[(o - 1) as usize]);
        assert_eq!(offsets.len(), 6);
    }

    #[test]
    fn test_state_transitions() {
        let mut c = Controller::new(CrawlMode::Paginated, 1, 1, 2, 3);
        assert_eq!(c.state(), CrawlState::AdvancingPage { offset: 1 });
        assert_eq!(c.advance(), Some(1));
        c.listing_loaded();
        assert_eq!(c.state(), CrawlState::ExtractingCards);
        c.cards_extracted(3);
        assert_eq!(c.state(), CrawlState::VisitingDetail);
        assert_eq!(c.finish_iteration(3, 3), CrawlState::AdvancingPage { offset: 2 });
        assert_eq!(c.advance(), None);
        assert_eq!(c.state(), CrawlState::Terminated(TerminationReason::BudgetExhausted));
    }
}
