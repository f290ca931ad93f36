//! Greedy copy-back search over a mirror of the decoder's ring dictionary.
//!
//! The encoder keeps its own [`RingDict`] in exactly the state the decoder will
//! reach after each token. Before searching, the next samples of the input (the
//! lookahead) are staged into the ring just past the write position. Because the ring
//! slot of input sample `n` is always `n % 4096`, staged samples are what the decoder
//! will hold there once it has decoded that far, so a match may run from history
//! into the lookahead and the decoder's one-at-a-time copy reproduces it.
//!
//! Staging overwrites the oldest history, so a match may only start
//! `4096 - lookahead` samples back, never further.

use std::{collections::HashMap, fmt, io::Write};

use smallvec::SmallVec;

use super::{LogWtr, MatchBackend};
use crate::{
    errors::PdtError,
    format::{Plane, Sample, Token},
    ring::{wrap, RingDict, RING_SIZE},
};

/// Longest run of samples kept in the [`MatchIndex`]
pub(crate) const MAX_RUN: usize = 16;

type Run<S> = SmallVec<[S; MAX_RUN]>;

/// The tokens for one plane, plus some statistics for the log
#[derive(Debug)]
pub(crate) struct TokenPass<S> {
    pub tokens: Vec<Token<S>>,
    pub literals: usize,
    pub copies: usize,
    /// number of samples produced by copy-backs
    pub copied: usize,
}

impl<S> TokenPass<S> {
    fn with_capacity(samples: usize) -> Self {
        Self {
            tokens: Vec::with_capacity(samples),
            literals: 0,
            copies: 0,
            copied: 0,
        }
    }

    fn add(&mut self, token: Token<S>) {
        match token {
            Token::Literal(..) => self.literals += 1,
            Token::BackReference { length, .. } => {
                self.copies += 1;
                self.copied += length;
            }
        }
        self.tokens.push(token);
    }
}

impl<S> fmt::Display for TokenPass<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "# Token Pass")?;
        writeln!(f, "literals: {}", self.literals)?;
        writeln!(f, "copy-backs: {} ({} samples)", self.copies, self.copied)?;
        write!(f, "flag bytes: {}", (self.tokens.len() + 7) / 8)
    }
}

/// Bounds on a usable copy-back for a plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SearchLimits {
    pub min_len: usize,
    pub max_len: usize,
    /// furthest a match may start behind the write position
    pub max_dist: usize,
}

impl SearchLimits {
    pub(crate) fn for_plane<P: Plane>() -> Self {
        let max_len = P::MAX_LENGTH.min(MAX_RUN);

        Self {
            min_len: P::MIN_LENGTH,
            max_len,
            max_dist: (P::MAX_OFFSET + 1).min(RING_SIZE - max_len),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Match {
    /// ring slot the copy starts from
    pub slot: usize,
    pub length: usize,
}

/// A strategy for finding the longest run in the ring that matches the lookahead
pub(crate) trait MatchFinder<S> {
    /// `slot` is about to be overwritten
    fn forget(&mut self, _ring: &RingDict<S>, _slot: usize) {}

    /// `slot` holds a written sample, and the `len` samples from it onwards are final
    fn remember(&mut self, _ring: &RingDict<S>, _slot: usize, _len: usize) {}

    /// Find a run matching the start of `ahead` with `history` samples written so far
    fn find(&self, ring: &RingDict<S>, ahead: &[S], history: usize) -> Option<Match>;
}

/// Maps the content of every run of `min_len..=max_len` samples in the ring to the
/// slot of the most recently written copy of that run.
#[derive(Debug)]
pub(crate) struct MatchIndex<S: Sample> {
    limits: SearchLimits,
    runs: HashMap<Run<S>, u16>,
    /// longest run indexed at each slot, so it can be rebuilt and removed
    indexed: Box<[u8]>,
}

impl<S: Sample> MatchIndex<S> {
    pub(crate) fn new(limits: SearchLimits) -> Self {
        Self {
            limits,
            runs: HashMap::new(),
            indexed: vec![0; RING_SIZE].into_boxed_slice(),
        }
    }
}

impl<S: Sample> MatchFinder<S> for MatchIndex<S> {
    fn forget(&mut self, ring: &RingDict<S>, slot: usize) {
        let slot = wrap(slot);
        let len = self.indexed[slot] as usize;
        self.indexed[slot] = 0;

        let mut run: Run<S> = ring.run(slot, len).collect();
        while run.len() >= self.limits.min_len {
            // a newer copy of the same run keeps its entry
            if self.runs.get(&run[..]) == Some(&(slot as u16)) {
                self.runs.remove(&run[..]);
            }
            run.pop();
        }
    }

    fn remember(&mut self, ring: &RingDict<S>, slot: usize, len: usize) {
        let slot = wrap(slot);
        let len = len.min(self.limits.max_len);
        self.indexed[slot] = len as u8;

        let mut run: Run<S> = SmallVec::new();
        for sample in ring.run(slot, len) {
            run.push(sample);
            if run.len() >= self.limits.min_len {
                self.runs.insert(run.clone(), slot as u16);
            }
        }
    }

    fn find(&self, ring: &RingDict<S>, ahead: &[S], _history: usize) -> Option<Match> {
        let longest = ahead.len().min(self.limits.max_len);

        (self.limits.min_len..=longest).rev().find_map(|length| {
            self.runs
                .get(&ahead[..length])
                .map(|&slot| slot as usize)
                .filter(|&slot| ring.offset_of(slot) < self.limits.max_dist)
                .map(|slot| Match { slot, length })
        })
    }
}

/// Brute force search of every possible start position, nearest first
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinearScan {
    limits: SearchLimits,
}

impl<S: Sample> MatchFinder<S> for LinearScan {
    fn find(&self, ring: &RingDict<S>, ahead: &[S], history: usize) -> Option<Match> {
        let longest = ahead.len().min(self.limits.max_len);
        let furthest = history.min(self.limits.max_dist);
        let mut best: Option<Match> = None;

        for dist in 1..=furthest {
            let slot = wrap(ring.cursor().wrapping_sub(dist));
            let length = ring
                .run(slot, longest)
                .zip(ahead)
                .take_while(|(s, a)| s == *a)
                .count();

            if length >= self.limits.min_len && best.map_or(true, |b| length > b.length) {
                best = Some(Match { slot, length });
                if length == longest {
                    break;
                }
            }
        }

        best
    }
}

/// Turn the samples of a plane into a stream of tokens that
/// [`decode_plane`](crate::decode::decode_plane) will expand back into `samples`
pub(crate) fn compress<P: Plane>(
    samples: &[P::Sample],
    width: usize,
    backend: MatchBackend,
    log: &mut Option<LogWtr>,
) -> Result<TokenPass<P::Sample>, PdtError> {
    let limits = SearchLimits::for_plane::<P>();
    let mut finder: Box<dyn MatchFinder<P::Sample>> = match backend {
        MatchBackend::Indexed => Box::new(MatchIndex::new(limits)),
        MatchBackend::Linear => Box::new(LinearScan { limits }),
    };

    let mut ring = RingDict::new();
    let mut pass = TokenPass::with_capacity(samples.len());
    // every position before `indexed` has been handed to the finder
    let mut indexed = 0;
    let mut pos = 0;

    while pos < samples.len() {
        let staged = &samples[pos..samples.len().min(pos + limits.max_len)];

        for k in 0..staged.len() {
            finder.forget(&ring, ring.cursor() + k);
        }
        ring.stage(staged);

        let ahead_end = pos + staged.len();
        for anchor in indexed..pos {
            finder.remember(&ring, anchor, ahead_end - anchor);
        }
        indexed = pos;

        // the decoder holds the unfinished part of a row in the ring,
        // so a token may not push it past the ring's size
        let column = pos % width;
        let ahead = &staged[..staged.len().min(RING_SIZE - column)];

        let token = match finder.find(&ring, ahead, pos) {
            Some(Match { slot, length }) => {
                let offset = ring.offset_of(slot);
                ring.copy_from(slot, length);
                debug_assert!(ring.run(wrap(pos), length).eq(ahead[..length].iter().copied()));

                if let Some(wtr) = log {
                    writeln!(
                        wtr,
                        "{:06x} - Encoded [Copyback]: offset: {} length: {} | start: {:03x}",
                        pos, offset, length, slot
                    )?;
                }
                Token::BackReference { offset, length }
            }
            None => {
                let sample = staged[0];
                ring.push(sample);

                if let Some(wtr) = log {
                    writeln!(wtr, "{:06x} - Uncoded: {:?}", pos, sample)?;
                }
                Token::Literal(sample)
            }
        };

        pos += token.size();
        pass.add(token);
    }

    Ok(pass)
}
