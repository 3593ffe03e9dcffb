//! Paged view over a search's results: the page currently shown plus the queue
//! of records still waiting their turn.
//!
//! "Show more" takes the next three from the queue. When the queue can no longer
//! fill a page, whatever is left is carried to the front of the new page and the
//! rest is refilled from the full result list, so a page never comes up short
//! while there are enough results overall. Records shown earlier may reappear.

use std::collections::HashSet;
use std::sync::Arc;

use crate::RestaurantRecord;

/// Number of recommendations shown at once.
pub const PAGE_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct RotationState {
    all: Arc<[RestaurantRecord]>,
    visible: Vec<RestaurantRecord>,
    queue: Vec<RestaurantRecord>,
}

impl RotationState {
    /// Split `results` into the first page and the queue behind it.
    pub fn initialize(results: Vec<RestaurantRecord>) -> Self {
        let all: Arc<[RestaurantRecord]> = results.into();
        let split = all.len().min(PAGE_SIZE);
        Self {
            visible: all[..split].to_vec(),
            queue: all[split..].to_vec(),
            all,
        }
    }

    /// The state after one "show more".
    pub fn advance(&self) -> Self {
        if self.queue.len() >= PAGE_SIZE {
            return Self {
                all: Arc::clone(&self.all),
                visible: self.queue[..PAGE_SIZE].to_vec(),
                queue: self.queue[PAGE_SIZE..].to_vec(),
            };
        }

        let leftovers = &self.queue;
        let carried: HashSet<&str> = leftovers.iter().map(|r| r.id.as_str()).collect();
        let fresh_pool: Vec<&RestaurantRecord> = self
            .all
            .iter()
            .filter(|r| !carried.contains(r.id.as_str()))
            .collect();

        let needed = (PAGE_SIZE - leftovers.len()).min(fresh_pool.len());
        let mut visible = leftovers.clone();
        visible.extend(fresh_pool[..needed].iter().map(|r| (*r).clone()));
        let queue = fresh_pool[needed..].iter().map(|r| (*r).clone()).collect();

        Self {
            all: Arc::clone(&self.all),
            visible,
            queue,
        }
    }

    pub fn visible(&self) -> &[RestaurantRecord] {
        &self.visible
    }

    pub fn queue(&self) -> &[RestaurantRecord] {
        &self.queue
    }

    pub fn all_results(&self) -> &[RestaurantRecord] {
        &self.all
    }

    /// No results at all: render a "no match" message rather than an error.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Whether "show more" can change what is on screen.
    pub fn can_show_more(&self) -> bool {
        self.all.len() > PAGE_SIZE
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self::initialize(Vec::new())
    }
}
