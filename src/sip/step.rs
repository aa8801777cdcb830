//! The queue of resolution steps.
//!
//! Steps are kept in an arena and linked into a single list in the order
//! they are to be sent and processed. Positions in the list are
//! expressed as [`Link`]s, i.e., the place a step index is stored at:
//! either the head of the list or the `next` field of a step. This way
//! a position stays valid when steps are inserted before whatever it
//! currently points to.
//!
//! Each step records in `already` the step that actually performs its
//! query. Equal queries, i.e., same record type and same target, are only
//! sent once. The step sending the query always comes first in the list.

use super::transport::SipTransport;
use crate::base::iana::Rtype;
use crate::base::name::name_eq;
use crate::base::record::{Answers, Status};
use crate::resolv::QueryHandle;
use rand::Rng;
use tracing::trace;

//------------ StepHint ------------------------------------------------------

/// A combination of transport and address record type to resolve for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct StepHint {
    pub transport: SipTransport,
    pub rtype: Rtype,
    pub port: u16,
}

//------------ StepState -----------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum StepState {
    /// Created but not yet in the list.
    New,

    /// Waiting to be sent.
    Queued,

    /// Answered from the cache.
    Cached,

    /// Waiting for the answer.
    Sent,

    /// Answered with the given status.
    Done(Status),
}

//------------ Step ----------------------------------------------------------

#[derive(Debug)]
pub(crate) struct Step {
    /// The next step in the list.
    pub next: Option<usize>,

    /// The step performing the query for this one.
    pub already: usize,

    /// The step whose answer produced this one.
    pub trace: Option<usize>,

    /// The domain name to query.
    pub target: String,

    /// The record type to query.
    pub rtype: Rtype,

    pub state: StepState,

    /// The query in flight.
    pub query: Option<QueryHandle>,

    /// The answers, if any arrived.
    pub results: Option<Answers>,

    /// The index of the hint this step resolves for.
    pub hint: Option<usize>,

    /// The port for results.
    pub port: u16,

    /// Ranking: preference first, then priority, then weight.
    pub prefer: u16,
    pub priority: u16,
    pub weight: u16,
}

//------------ Link ----------------------------------------------------------

/// A position in the step list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Link {
    /// The start of the list.
    Head,

    /// Right after the given step.
    After(usize),
}

//------------ StepList ------------------------------------------------------

#[derive(Debug)]
pub(crate) struct StepList {
    steps: Vec<Step>,
    head: Option<usize>,

    /// Where appended steps go.
    queue: Link,

    /// The next step to process.
    pub process: Link,

    /// The next step to send.
    pub send: Link,
}

impl Default for StepList {
    fn default() -> Self {
        StepList {
            steps: Vec::new(),
            head: None,
            queue: Link::Head,
            process: Link::Head,
            send: Link::Head,
        }
    }
}

impl StepList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, idx: usize) -> &Step {
        &self.steps[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Step {
        &mut self.steps[idx]
    }

    /// Returns the step at a position.
    pub fn at(&self, link: Link) -> Option<usize> {
        match link {
            Link::Head => self.head,
            Link::After(idx) => self.steps[idx].next,
        }
    }

    fn set(&mut self, link: Link, step: Option<usize>) {
        match link {
            Link::Head => self.head = step,
            Link::After(idx) => self.steps[idx].next = step,
        }
    }

    /// Returns the indexes of the listed steps starting with `start`.
    pub fn iter_from(
        &self,
        start: Option<usize>,
    ) -> impl Iterator<Item = usize> + '_ {
        let mut cur = start;
        std::iter::from_fn(move || {
            let res = cur?;
            cur = self.steps[res].next;
            Some(res)
        })
    }

    /// Returns the indexes of all listed steps.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.iter_from(self.head)
    }

    /// Returns the listed steps that share the query of `idx`.
    ///
    /// This excludes `idx` itself.
    pub fn followers(&self, idx: usize) -> Vec<usize> {
        self.iter_from(self.steps[idx].next)
            .filter(|&other| self.steps[other].already == idx)
            .collect()
    }

    /// Creates a new step for querying `prefix` + `domain`.
    ///
    /// If a step with the same query exists, the new step shares it. The
    /// step needs to be added to the list via [`append`][Self::append]
    /// or [`insert`][Self::insert].
    pub fn create(
        &mut self,
        rtype: Rtype,
        prefix: Option<&str>,
        domain: &str,
    ) -> usize {
        let target = match prefix {
            Some(prefix) => format!("{}{}", prefix, domain),
            None => domain.to_string(),
        };
        let idx = self.steps.len();
        let existing = self.iter().find(|&other| {
            let other = &self.steps[other];
            other.rtype == rtype && name_eq(&other.target, &target)
        });
        let (already, target, results) = match existing {
            Some(other) => (
                other,
                self.steps[other].target.clone(),
                self.steps[other].results.clone(),
            ),
            None => (idx, target, None),
        };
        self.steps.push(Step {
            next: None,
            already,
            trace: None,
            target,
            rtype,
            state: StepState::New,
            query: None,
            results,
            hint: None,
            port: 0,
            prefer: 0,
            priority: 0,
            weight: 0,
        });
        idx
    }

    /// Adds a step to the end of the list.
    pub fn append(&mut self, idx: usize) {
        self.set(self.queue, Some(idx));
        self.queue = Link::After(idx);
        self.adopt(idx);
    }

    /// Inserts a step among the unsent ones.
    ///
    /// The step goes after all steps with lower preference or lower
    /// priority and before those with higher ones. Among steps with equal
    /// preference and priority, its position is chosen randomly with
    /// a probability proportional to its weight. Steps with a weight of
    /// zero go last.
    pub fn insert<R: Rng>(&mut self, idx: usize, rng: &mut R) {
        let (prefer, priority) = (self.steps[idx].prefer, self.steps[idx].priority);
        let weight = u32::from(self.steps[idx].weight);

        let mut insert = self.send;
        let mut at = self.send;
        let mut total = 0u32;
        let mut count = 0usize;
        while let Some(cur) = self.at(at) {
            let next = Link::After(cur);
            let other = &self.steps[cur];
            if prefer < other.prefer {
                break;
            }
            if prefer > other.prefer {
                insert = next;
                at = next;
                total = 0;
                count = 0;
                continue;
            }
            if priority < other.priority {
                break;
            }
            if priority > other.priority {
                insert = next;
                at = next;
                total = 0;
                count = 0;
                continue;
            }
            total += u32::from(other.weight);
            count += 1;
            at = next;
        }

        if weight > 0 {
            total += weight
        } else {
            insert = at
        }
        let mut by = if insert != at {
            rng.gen_range(0..total)
        } else {
            total
        };
        trace!(
            "{} {} query for {} (N={} {}/{})",
            if insert != at { "inserting" } else { "appending" },
            self.steps[idx].rtype,
            self.steps[idx].target,
            count,
            by,
            total
        );
        if insert != at {
            while by > weight {
                match self.at(insert) {
                    Some(cur) => {
                        by = by.saturating_sub(u32::from(self.steps[cur].weight));
                        insert = Link::After(cur);
                    }
                    None => break,
                }
            }
        }

        self.steps[idx].next = self.at(insert);
        self.set(insert, Some(idx));
        if insert == self.queue {
            self.queue = Link::After(idx);
        }

        let already = self.steps[idx].already;
        if already == idx {
            self.steps[idx].state = StepState::Queued;
            return;
        }
        if self.iter_from(self.steps[idx].next).any(|other| other == already) {
            // The step sharing the query now comes later, so this one
            // takes over sending it.
            let moved: Vec<_> = self
                .iter_from(self.steps[idx].next)
                .filter(|&other| self.steps[other].already == already)
                .collect();
            for other in moved {
                self.steps[other].already = idx;
            }
            self.steps[idx].already = idx;
            self.steps[idx].state = StepState::Queued;
        } else {
            self.adopt(idx);
        }
    }

    /// Sets the state of a freshly listed step.
    fn adopt(&mut self, idx: usize) {
        let already = self.steps[idx].already;
        if already == idx {
            self.steps[idx].state = StepState::Queued;
        } else {
            self.steps[idx].state = self.steps[already].state;
            self.steps[idx].results = self.steps[already].results.clone();
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn srv_step(
        list: &mut StepList,
        target: &str,
        priority: u16,
        weight: u16,
    ) -> usize {
        let idx = list.create(Rtype::A, None, target);
        let step = list.get_mut(idx);
        step.prefer = 1;
        step.priority = priority;
        step.weight = weight;
        idx
    }

    fn targets(list: &StepList) -> Vec<&str> {
        list.iter().map(|idx| list.get(idx).target.as_str()).collect()
    }

    #[test]
    fn duplicates_share_queries() {
        let mut list = StepList::new();
        let first = list.create(Rtype::SRV, Some("_sip._udp."), "example.com");
        list.append(first);
        let second = list.create(Rtype::SRV, Some("_sip._udp."), "EXAMPLE.com.");
        list.append(second);
        let other = list.create(Rtype::SRV, Some("_sip._tcp."), "example.com");
        list.append(other);

        assert_eq!(list.get(first).target, "_sip._udp.example.com");
        assert_eq!(list.get(second).already, first);
        assert_eq!(list.get(second).state, StepState::Queued);
        assert_eq!(list.get(other).already, other);
        assert_eq!(list.followers(first), [second]);
        assert_eq!(list.iter().count(), 3);
    }

    #[test]
    fn insert_orders_by_priority() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut list = StepList::new();
        for (target, priority) in [("c", 2), ("a", 0), ("b", 1), ("d", 2)] {
            let idx = srv_step(&mut list, target, priority, 0);
            list.insert(idx, &mut rng);
        }
        assert_eq!(targets(&list), ["a", "b", "c", "d"]);

        // Appending after an insertion continues at the end.
        let idx = list.create(Rtype::A, None, "e");
        list.append(idx);
        assert_eq!(targets(&list), ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn inserted_step_takes_over_query() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut list = StepList::new();
        let late = srv_step(&mut list, "host", 5, 0);
        list.insert(late, &mut rng);
        let early = srv_step(&mut list, "host", 1, 0);
        assert_eq!(list.get(early).already, late);
        list.insert(early, &mut rng);

        assert_eq!(list.get(early).already, early);
        assert_eq!(list.get(late).already, early);
        assert_eq!(list.get(early).state, StepState::Queued);
    }

    #[test]
    fn srv_weights() {
        let mut rng = StdRng::seed_from_u64(3263);
        let runs = 10_000;
        let mut heavy_first = 0;
        for _ in 0..runs {
            let mut list = StepList::new();
            for (target, priority, weight) in
                [("light", 0, 10), ("heavy", 0, 90), ("backup", 1, 100)]
            {
                let idx = srv_step(&mut list, target, priority, weight);
                list.insert(idx, &mut rng);
            }
            let order = targets(&list);
            assert_eq!(order[2], "backup");
            if order[0] == "heavy" {
                heavy_first += 1;
            }
        }
        let ratio = f64::from(heavy_first) / f64::from(runs);
        assert!((0.85..0.95).contains(&ratio), "ratio {}", ratio);
    }
}
